// TermSleuth - core/terms.rs
//
// Search-term template loading and the two template artifacts
// (blank sample and export of the loaded set).
//
// Template shape: first sheet, first column, row 0 is a header and is always
// skipped. Every later first cell is a candidate term; candidates are trimmed,
// blanks dropped and duplicates discarded (first occurrence wins).

use crate::core::model::TermSet;
use crate::platform::tabular::{TabularFormat, TabularIo};
use crate::util::constants;
use crate::util::error::TemplateError;
use chrono::NaiveDate;
use std::path::Path;

/// Build a term set from parsed template rows.
///
/// # Errors
/// `TemplateError::Empty` when no usable term remains after skipping the
/// header row and discarding blanks.
pub fn load_terms(rows: &[Vec<String>]) -> Result<TermSet, TemplateError> {
    let candidates = rows
        .iter()
        .skip(1)
        .filter_map(|row| row.first())
        .map(String::as_str);
    let terms = TermSet::from_candidates(candidates);
    if terms.is_empty() {
        return Err(TemplateError::Empty);
    }
    Ok(terms)
}

/// Read and parse a template file from disk.
///
/// The format is chosen by extension. Files above `MAX_TEMPLATE_FILE_SIZE`
/// are rejected before reading.
pub fn load_template(path: &Path, io: &dyn TabularIo) -> Result<TermSet, TemplateError> {
    let format = TabularFormat::from_path(path).ok_or_else(|| TemplateError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let size = std::fs::metadata(path)
        .map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if size > constants::MAX_TEMPLATE_FILE_SIZE {
        return Err(TemplateError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max_size: constants::MAX_TEMPLATE_FILE_SIZE,
        });
    }

    let bytes = std::fs::read(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = io.parse_tabular(&bytes, format)?;
    let terms = load_terms(&rows)?;

    tracing::info!(
        template = %path.display(),
        rows = rows.len(),
        terms = terms.len(),
        "Template loaded"
    );
    Ok(terms)
}

/// Rows of the downloadable sample template: the header and a few blank rows.
pub fn sample_template_rows() -> Vec<Vec<String>> {
    let mut rows = vec![vec![constants::TEMPLATE_HEADER.to_string()]];
    rows.extend(
        std::iter::repeat_with(|| vec![String::new()]).take(constants::SAMPLE_TEMPLATE_BLANK_ROWS),
    );
    rows
}

/// Rows for re-exporting a loaded term set in template shape, so it can be
/// edited and loaded again.
pub fn template_export_rows(terms: &TermSet) -> Vec<Vec<String>> {
    std::iter::once(vec![constants::TEMPLATE_HEADER.to_string()])
        .chain(terms.iter().map(|t| vec![t.clone()]))
        .collect()
}

/// File name for a template export made on `date`: `template_export_<YYYY-MM-DD>.xlsx`.
pub fn template_export_file_name(date: NaiveDate, format: TabularFormat) -> String {
    format!(
        "{}{}.{}",
        constants::TEMPLATE_EXPORT_PREFIX,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// The first few terms of a set plus a count of the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePreview<'a> {
    pub shown: Vec<&'a str>,
    pub remaining: usize,
}

impl std::fmt::Display for TemplatePreview<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for term in &self.shown {
            writeln!(f, "  {term}")?;
        }
        if self.remaining > 0 {
            writeln!(f, "  ... and {} more", self.remaining)?;
        }
        Ok(())
    }
}

pub fn preview(terms: &TermSet, limit: usize) -> TemplatePreview<'_> {
    TemplatePreview {
        shown: terms.iter().take(limit).map(String::as_str).collect(),
        remaining: terms.len().saturating_sub(limit),
    }
}
