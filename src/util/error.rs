// TermSleuth - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation: every variant keeps the path it
// concerns and, where one exists, the underlying source error.
//
// Propagation policy:
//   - TemplateError and ScanError are fatal to the operation that raised them.
//   - DiscoveryError::DirectoryAccess, ExtractionError and CopyError are
//     recovered inside the scan loop and only logged.
//   - ReportError::Persistence triggers the fallback artifact path.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Boxed source error used where the producing library is a pluggable
/// collaborator (e.g. a document extractor).
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all TermSleuth operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum TermSleuthError {
    /// Template loading failed.
    Template(TemplateError),

    /// Source tree enumeration failed.
    Discovery(DiscoveryError),

    /// Document text extraction failed.
    Extraction(ExtractionError),

    /// Copying a matched file failed.
    Copy(CopyError),

    /// Report serialisation or persistence failed.
    Report(ReportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// A scan could not be started.
    Scan(ScanError),
}

impl fmt::Display for TermSleuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(e) => write!(f, "Template error: {e}"),
            Self::Discovery(e) => write!(f, "Discovery error: {e}"),
            Self::Extraction(e) => write!(f, "Extraction error: {e}"),
            Self::Copy(e) => write!(f, "Copy error: {e}"),
            Self::Report(e) => write!(f, "Report error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Scan(e) => write!(f, "Scan error: {e}"),
        }
    }
}

impl std::error::Error for TermSleuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Template(e) => Some(e),
            Self::Discovery(e) => Some(e),
            Self::Extraction(e) => Some(e),
            Self::Copy(e) => Some(e),
            Self::Report(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Scan(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Template errors
// ---------------------------------------------------------------------------

/// Errors related to loading the search-term template.
#[derive(Debug)]
pub enum TemplateError {
    /// The template file could not be read.
    Io { path: PathBuf, source: io::Error },

    /// The template file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// The file extension is not a recognised tabular format.
    UnsupportedFormat { path: PathBuf },

    /// The workbook could not be parsed.
    Workbook { source: calamine::Error },

    /// The CSV file could not be parsed.
    Csv { source: csv::Error },

    /// The workbook contains no worksheets.
    NoSheets,

    /// Zero usable terms remained after skipping the header row and
    /// discarding blanks.
    Empty,
}

impl TemplateError {
    /// True when the file was readable tabular data but held no terms.
    pub fn is_empty_template(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Cannot read template '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Template '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::UnsupportedFormat { path } => write!(
                f,
                "Template '{}' is not a supported format (expected .xlsx, .xls, .ods or .csv)",
                path.display()
            ),
            Self::Workbook { source } => write!(f, "Cannot parse spreadsheet: {source}"),
            Self::Csv { source } => write!(f, "Cannot parse CSV: {source}"),
            Self::NoSheets => write!(f, "Spreadsheet contains no worksheets"),
            Self::Empty => write!(
                f,
                "Template contains no search terms. Put one term per row in the \
                 first column, below a header row."
            ),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Workbook { source } => Some(source),
            Self::Csv { source } => Some(source),
            _ => None,
        }
    }
}

impl From<TemplateError> for TermSleuthError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

/// Errors related to source tree enumeration.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The root scan path does not exist or is not accessible.
    RootNotFound { path: PathBuf },

    /// The root path is not a directory.
    NotADirectory { path: PathBuf },

    /// Permission denied accessing the root path.
    PermissionDenied { path: PathBuf, source: io::Error },

    /// A directory below the root could not be listed. Recovered locally:
    /// the subtree contributes zero entries.
    DirectoryAccess { path: PathBuf, source: io::Error },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Source folder '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Source '{}' is not a folder", path.display())
            }
            Self::PermissionDenied { path, source } => {
                write!(
                    f,
                    "Permission denied accessing '{}': {source}",
                    path.display()
                )
            }
            Self::DirectoryAccess { path, source } => {
                write!(f, "Cannot list folder '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PermissionDenied { source, .. } => Some(source),
            Self::DirectoryAccess { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DiscoveryError> for TermSleuthError {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

// ---------------------------------------------------------------------------
// Extraction errors
// ---------------------------------------------------------------------------

/// Errors raised by a document text extractor.
#[derive(Debug)]
pub enum ExtractionError {
    /// The document could not be opened at all.
    Open { source: BoxedSource },

    /// A single page failed to yield text (0-based index).
    Page { index: usize, source: BoxedSource },

    /// A page index beyond the document's page count was requested.
    PageOutOfRange { index: usize, page_count: usize },
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { source } => write!(f, "Cannot open document: {source}"),
            Self::Page { index, source } => {
                write!(f, "Cannot extract text from page {}: {source}", index + 1)
            }
            Self::PageOutOfRange { index, page_count } => write!(
                f,
                "Page {} requested but document has {page_count} page(s)",
                index + 1
            ),
        }
    }
}

impl std::error::Error for ExtractionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source } => Some(source.as_ref()),
            Self::Page { source, .. } => Some(source.as_ref()),
            Self::PageOutOfRange { .. } => None,
        }
    }
}

impl From<ExtractionError> for TermSleuthError {
    fn from(e: ExtractionError) -> Self {
        Self::Extraction(e)
    }
}

// ---------------------------------------------------------------------------
// Copy errors
// ---------------------------------------------------------------------------

/// Errors copying a matched file into the destination tree.
/// `path` is the entry's path relative to the source root.
#[derive(Debug)]
pub enum CopyError {
    /// The source file could not be read.
    Read { path: String, source: io::Error },

    /// An intermediate destination directory could not be created.
    CreateDir { path: String, source: io::Error },

    /// The destination file could not be created or written.
    Write { path: String, source: io::Error },

    /// Copying was requested but no destination root was given.
    NoDestination { path: String },
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "Cannot read '{path}' for copy: {source}"),
            Self::CreateDir { path, source } => {
                write!(f, "Cannot create destination folder for '{path}': {source}")
            }
            Self::Write { path, source } => {
                write!(f, "Cannot write copy of '{path}': {source}")
            }
            Self::NoDestination { path } => {
                write!(f, "Cannot copy '{path}': no destination folder is set")
            }
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::CreateDir { source, .. } => Some(source),
            Self::Write { source, .. } => Some(source),
            Self::NoDestination { .. } => None,
        }
    }
}

impl From<CopyError> for TermSleuthError {
    fn from(e: CopyError) -> Self {
        Self::Copy(e)
    }
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

/// Errors related to report serialisation and persistence.
#[derive(Debug)]
pub enum ReportError {
    /// Workbook serialisation failed.
    Xlsx {
        source: rust_xlsxwriter::XlsxError,
    },

    /// CSV serialisation failed.
    Csv { source: csv::Error },

    /// Flushing the serialised buffer failed.
    Io { source: io::Error },

    /// Writing the report under the destination root failed.
    Persistence { path: PathBuf, source: io::Error },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xlsx { source } => write!(f, "Spreadsheet serialisation error: {source}"),
            Self::Csv { source } => write!(f, "CSV serialisation error: {source}"),
            Self::Io { source } => write!(f, "Report buffer error: {source}"),
            Self::Persistence { path, source } => {
                write!(f, "Cannot save report to '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Xlsx { source } => Some(source),
            Self::Csv { source } => Some(source),
            Self::Io { source } => Some(source),
            Self::Persistence { source, .. } => Some(source),
        }
    }
}

impl From<ReportError> for TermSleuthError {
    fn from(e: ReportError) -> Self {
        Self::Report(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for TermSleuthError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Scan errors
// ---------------------------------------------------------------------------

/// Reasons a scan cannot be started. Each message names the missing
/// precondition so the user knows what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// No search terms are loaded.
    NoTemplate,

    /// No source folder has been chosen.
    NoSource,

    /// No destination folder has been chosen.
    NoDestination,

    /// Another scan is still in flight.
    Busy,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTemplate => write!(f, "No template loaded. Upload a template first."),
            Self::NoSource => write!(f, "No source folder. Choose a source folder."),
            Self::NoDestination => {
                write!(f, "No destination folder. Choose a destination folder.")
            }
            Self::Busy => write!(
                f,
                "A scan is already running. Wait for it to finish or cancel it."
            ),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<ScanError> for TermSleuthError {
    fn from(e: ScanError) -> Self {
        Self::Scan(e)
    }
}
