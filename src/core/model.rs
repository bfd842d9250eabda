// TermSleuth - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies. These types are the shared vocabulary across all layers.

use crate::util::constants;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// =============================================================================
// Term set
// =============================================================================

/// Ordered, duplicate-free list of trimmed, non-empty search terms.
///
/// Construction goes through [`TermSet::from_candidates`], which enforces the
/// invariants: whitespace trimmed, blanks dropped, first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermSet {
    terms: Vec<String>,
}

impl TermSet {
    /// An empty set ("no template loaded").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from raw candidate strings.
    pub fn from_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = std::collections::HashSet::new();
        let mut terms = Vec::new();
        for candidate in candidates {
            let trimmed = candidate.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            if seen.insert(trimmed.to_string()) {
                terms.push(trimmed.to_string());
            }
        }
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.terms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.terms.iter()
    }
}

impl<'a> IntoIterator for &'a TermSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

// =============================================================================
// Entry (output of enumeration)
// =============================================================================

/// A file discovered under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Storage handle for the file (an absolute path for local storage).
    pub handle: PathBuf,

    /// File name as listed by the storage provider.
    pub name: String,

    /// Forward-slash-joined path from the source root, e.g. `sub/dir/file.pdf`.
    pub relative_path: String,
}

impl Entry {
    /// Lower-case extension of the file name without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Path segments of `relative_path`, directories first, file name last.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.relative_path.split('/').filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Match locations
// =============================================================================

/// How a term was found in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MatchTag {
    /// The file name contains the term.
    FileName,

    /// The text of the given page (1-based) contains the term.
    PdfPage(usize),
}

impl fmt::Display for MatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTag::FileName => f.write_str("FILENAME"),
            MatchTag::PdfPage(n) => write!(f, "PDF_PAGE_{n}"),
        }
    }
}

/// One place a term was found. Displays as `"<TAG>: <relative/path>"`,
/// which is the form written into the report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MatchLocation {
    pub tag: MatchTag,
    pub path: String,
}

impl MatchLocation {
    pub fn file_name(path: &str) -> Self {
        Self {
            tag: MatchTag::FileName,
            path: path.to_string(),
        }
    }

    pub fn pdf_page(page: usize, path: &str) -> Self {
        Self {
            tag: MatchTag::PdfPage(page),
            path: path.to_string(),
        }
    }
}

impl fmt::Display for MatchLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.path)
    }
}

// =============================================================================
// Found map
// =============================================================================

/// Mapping from each term to the locations it was found at, in term order.
///
/// Every term of the set the map was created from has a slot, possibly
/// empty. Raw locations may repeat (a file can match by name and on several
/// pages); deduplication happens when the report is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundMap {
    slots: Vec<(String, Vec<MatchLocation>)>,
}

impl FoundMap {
    pub fn new(terms: &TermSet) -> Self {
        Self {
            slots: terms.iter().map(|t| (t.clone(), Vec::new())).collect(),
        }
    }

    /// Append a location to the term at `term_index` (term-set order).
    pub fn record(&mut self, term_index: usize, location: MatchLocation) {
        if let Some((_, locations)) = self.slots.get_mut(term_index) {
            locations.push(location);
        }
    }

    /// Raw locations recorded for `term`, or `None` if the term is unknown.
    pub fn get(&self, term: &str) -> Option<&[MatchLocation]> {
        self.slots
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, locs)| locs.as_slice())
    }

    /// Term and raw locations of the slot at `index` (term-set order).
    pub fn slot(&self, index: usize) -> Option<(&str, &[MatchLocation])> {
        self.slots
            .get(index)
            .map(|(t, locs)| (t.as_str(), locs.as_slice()))
    }

    /// Locations for `term` with exact duplicates removed, first occurrence kept.
    pub fn unique_locations(&self, term: &str) -> Vec<&MatchLocation> {
        Self::dedup(self.get(term).unwrap_or_default())
    }

    /// `locations` with exact duplicates removed, first occurrence kept.
    pub fn dedup(locations: &[MatchLocation]) -> Vec<&MatchLocation> {
        let mut seen = std::collections::HashSet::new();
        locations.iter().filter(|loc| seen.insert(*loc)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MatchLocation])> {
        self.slots.iter().map(|(t, l)| (t.as_str(), l.as_slice()))
    }

    /// Total number of raw locations recorded across all terms.
    pub fn total_locations(&self) -> usize {
        self.slots.iter().map(|(_, l)| l.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// =============================================================================
// Scan options
// =============================================================================

/// How a term is compared against file names and page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Plain substring containment: `AMI1` matches `AMI100.pdf`.
    #[default]
    Substring,

    /// The term must appear delimited by word boundaries.
    Word,
}

/// Options for a single scan invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Lower-case names, text and terms before every comparison.
    pub case_insensitive: bool,

    /// Copy every matched file into `destination_root`.
    pub copy_matches: bool,

    /// Destination tree for copies (required when `copy_matches` is set).
    pub destination_root: Option<PathBuf>,

    /// Comparison strategy.
    pub match_mode: MatchMode,

    /// Lower-case extensions (no dot) whose page text is searched.
    pub document_extensions: Vec<String>,

    /// Files processed between progress checkpoints.
    pub progress_interval: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            copy_matches: false,
            destination_root: None,
            match_mode: MatchMode::Substring,
            document_extensions: constants::DEFAULT_DOCUMENT_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            progress_interval: constants::DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ScanOptions {
    /// True if `entry` should have its page text searched.
    pub fn is_document(&self, entry: &Entry) -> bool {
        entry
            .extension()
            .is_some_and(|ext| self.document_extensions.iter().any(|d| *d == ext))
    }
}

// =============================================================================
// Report rows
// =============================================================================

/// Classification of a term in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportResult {
    Found,
    NotFound,
}

impl ReportResult {
    /// Value written into the `result` column.
    pub fn label(&self) -> &'static str {
        match self {
            ReportResult::Found => constants::RESULT_FOUND,
            ReportResult::NotFound => constants::RESULT_NOT_FOUND,
        }
    }
}

impl fmt::Display for ReportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One report line: a term, its classification, and its joined locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub term: String,
    pub result: ReportResult,
    pub where_found: String,
}

impl ReportRow {
    /// Cells in report column order.
    pub fn cells(&self) -> [String; 3] {
        [
            self.term.clone(),
            self.result.label().to_string(),
            self.where_found.clone(),
        ]
    }
}

// =============================================================================
// Scan summary
// =============================================================================

/// Summary statistics for a finished (or cancelled) scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Files produced by enumeration.
    pub files_discovered: usize,

    /// Files that went through the match engine.
    pub files_scanned: usize,

    /// Raw match records across all terms (before deduplication).
    pub matches_found: usize,

    /// Files with at least one hit.
    pub files_matched: usize,

    /// Matched files successfully copied to the destination.
    pub files_copied: usize,

    /// Matched files whose copy failed.
    pub copy_failures: usize,

    /// Documents or pages whose text could not be extracted.
    pub extraction_failures: usize,

    /// Subdirectories that could not be listed.
    pub skipped_subtrees: usize,

    /// Terms with at least one location.
    pub terms_found: usize,

    /// Terms with no location.
    pub terms_not_found: usize,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// True if the scan stopped on a cancel request.
    pub cancelled: bool,
}
