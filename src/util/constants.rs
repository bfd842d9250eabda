// TermSleuth - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every configurable bound has a default plus an absolute range that
// config.toml values are validated against.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "TermSleuth";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "TermSleuth";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Template (search term spreadsheet)
// =============================================================================

/// Header cell written into sample and exported templates.
pub const TEMPLATE_HEADER: &str = "searchword";

/// Sheet name used for sample and exported templates.
pub const TEMPLATE_SHEET_NAME: &str = "template";

/// File name of the downloadable sample template.
pub const SAMPLE_TEMPLATE_FILE_NAME: &str = "template_sample.xlsx";

/// Number of blank example rows in the sample template.
pub const SAMPLE_TEMPLATE_BLANK_ROWS: usize = 3;

/// Prefix of the exported-template file name (a date and `.xlsx` follow).
pub const TEMPLATE_EXPORT_PREFIX: &str = "template_export_";

/// Maximum size of a template file in bytes. Anything larger is almost
/// certainly the wrong file.
pub const MAX_TEMPLATE_FILE_SIZE: u64 = 50 * 1024 * 1024; // 50 MB

/// Number of terms shown in a template preview before "... and N more".
pub const TEMPLATE_PREVIEW_LIMIT: usize = 8;

// =============================================================================
// Discovery limits
// =============================================================================

/// Default maximum directory recursion depth during enumeration.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Hard upper bound on max depth (prevents runaway traversal).
pub const ABSOLUTE_MAX_DEPTH: usize = 256;

/// File size in bytes at or above which file contents are memory-mapped
/// instead of read onto the heap.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 64 * 1024 * 1024; // 64 MB

// =============================================================================
// Scan
// =============================================================================

/// Files processed between progress checkpoints. The final file always
/// checkpoints regardless of this value.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 5;

/// Minimum configurable progress interval.
pub const MIN_PROGRESS_INTERVAL: usize = 1;

/// Maximum configurable progress interval.
pub const MAX_PROGRESS_INTERVAL: usize = 1_000;

/// File extensions (lower-case, no dot) whose page text is searched.
pub const DEFAULT_DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

/// Maximum number of lines retained by the in-memory activity log.
/// Older lines are dropped first; every line is still sent to tracing.
pub const MAX_ACTIVITY_LINES: usize = 10_000;

// =============================================================================
// Report
// =============================================================================

/// Fixed name of the report written under the destination root.
pub const DEFAULT_REPORT_FILE_NAME: &str = "search_report.xlsx";

/// Prefix of the timestamped fallback report name.
pub const REPORT_FALLBACK_PREFIX: &str = "search_report_";

/// chrono format for the timestamp in the fallback report name.
pub const REPORT_FALLBACK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Sheet name of the generated report.
pub const REPORT_SHEET_NAME: &str = "report";

/// Report header row.
pub const REPORT_HEADER: [&str; 3] = ["searchword", "result", "where_found"];

/// Longest text an xlsx cell accepts. Longer report cells are cut short
/// with a marker giving the number of characters left out.
pub const XLSX_MAX_CELL_CHARS: usize = 32_767;

/// Delimiter between deduplicated locations in the `where_found` column.
pub const LOCATION_DELIMITER: &str = " ; ";

/// `result` column value for terms with at least one location.
pub const RESULT_FOUND: &str = "FOUND";

/// `result` column value for terms with no locations.
pub const RESULT_NOT_FOUND: &str = "NOT FOUND";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Subdirectory of the platform data directory that receives fallback
/// reports when the destination folder cannot be written.
pub const FALLBACK_DIR_NAME: &str = "reports";
