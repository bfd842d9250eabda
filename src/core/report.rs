// TermSleuth - core/report.rs
//
// Report building, serialisation and persistence.
//
// One row per term, in term-set order, whether or not the term was found.
// `where_found` joins the term's unique locations with " ; ". The report is
// always produced in memory first; writing it under the destination root is
// attempted second, and a failed write hands the in-memory artifact back to
// the caller under a timestamped name instead of failing the scan.

use crate::core::model::{FoundMap, ReportResult, ReportRow, ScanSummary, TermSet};
use crate::platform::storage::StorageProvider;
use crate::platform::tabular::{TabularFormat, TabularIo};
use crate::util::constants;
use crate::util::error::ReportError;
use chrono::{DateTime, TimeZone};
use std::path::{Path, PathBuf};

/// Build one report row per term, in term-set order.
pub fn build_report(terms: &TermSet, found: &FoundMap) -> Vec<ReportRow> {
    terms
        .iter()
        .enumerate()
        .map(|(index, term)| {
            // Slots follow term order when the map was built from `terms`.
            let raw = match found.slot(index) {
                Some((slot_term, locations)) if slot_term == term => locations,
                _ => found.get(term).unwrap_or_default(),
            };
            let locations = FoundMap::dedup(raw);
            let result = if locations.is_empty() {
                ReportResult::NotFound
            } else {
                ReportResult::Found
            };
            let where_found = locations
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(constants::LOCATION_DELIMITER);
            ReportRow {
                term: term.clone(),
                result,
                where_found,
            }
        })
        .collect()
}

/// Header row followed by one row of cells per report row.
pub fn report_table(rows: &[ReportRow]) -> Vec<Vec<String>> {
    std::iter::once(
        constants::REPORT_HEADER
            .iter()
            .map(|h| (*h).to_string())
            .collect(),
    )
    .chain(rows.iter().map(|r| r.cells().to_vec()))
    .collect()
}

/// Fill the term totals of `summary` from the report rows.
pub fn summarize(rows: &[ReportRow], summary: &mut ScanSummary) {
    summary.terms_found = rows
        .iter()
        .filter(|r| r.result == ReportResult::Found)
        .count();
    summary.terms_not_found = rows.len() - summary.terms_found;
}

/// A serialised report held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub file_name: String,
    pub format: TabularFormat,
    pub bytes: Vec<u8>,
}

/// Serialise report rows into an artifact named `file_name`.
pub fn serialize_report(
    rows: &[ReportRow],
    io: &dyn TabularIo,
    format: TabularFormat,
    file_name: &str,
) -> Result<ReportArtifact, ReportError> {
    let bytes = io.write_tabular(&report_table(rows), constants::REPORT_SHEET_NAME, format)?;
    Ok(ReportArtifact {
        file_name: file_name.to_string(),
        format,
        bytes,
    })
}

/// Where the report ended up.
#[derive(Debug)]
pub enum PersistOutcome {
    /// Written under the destination root.
    Saved { path: PathBuf },

    /// Could not be written; the caller must deliver the artifact some other
    /// way (download, fallback folder).
    Download {
        artifact: ReportArtifact,
        reason: ReportError,
    },
}

impl PersistOutcome {
    pub fn saved_path(&self) -> Option<&Path> {
        match self {
            PersistOutcome::Saved { path } => Some(path),
            PersistOutcome::Download { .. } => None,
        }
    }
}

/// Timestamped name used when the report cannot be saved to the destination,
/// e.g. `search_report_2024-03-09_141502.xlsx`.
pub fn fallback_file_name<Tz>(format: TabularFormat, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}{}.{}",
        constants::REPORT_FALLBACK_PREFIX,
        now.format(constants::REPORT_FALLBACK_TIMESTAMP_FORMAT),
        format.extension()
    )
}

/// Write the artifact into `dest_root`, overwriting any previous report.
///
/// Never fails: a write error yields `Download` carrying the artifact renamed
/// with [`fallback_file_name`] for `now`.
pub fn persist_report<Tz>(
    artifact: ReportArtifact,
    dest_root: &Path,
    storage: &dyn StorageProvider,
    now: &DateTime<Tz>,
) -> PersistOutcome
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let attempt = storage
        .create_or_open_file(dest_root, &artifact.file_name)
        .and_then(|path| storage.write_bytes(&path, &artifact.bytes).map(|()| path));

    match attempt {
        Ok(path) => {
            tracing::info!(report = %path.display(), bytes = artifact.bytes.len(), "Report saved");
            PersistOutcome::Saved { path }
        }
        Err(source) => {
            let reason = ReportError::Persistence {
                path: dest_root.join(&artifact.file_name),
                source,
            };
            tracing::warn!(error = %reason, "Report not saved to destination, offering download");
            let file_name = fallback_file_name(artifact.format, now);
            PersistOutcome::Download {
                artifact: ReportArtifact {
                    file_name,
                    ..artifact
                },
                reason,
            }
        }
    }
}

/// Deliver an artifact into a local folder (the CLI stand-in for a browser
/// download). Creates the folder if needed.
pub fn save_to_dir(artifact: &ReportArtifact, dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&artifact.file_name);
    std::fs::write(&path, &artifact.bytes)?;
    Ok(path)
}

/// Save into the first of `dirs` that accepts the artifact.
///
/// # Errors
/// The last refusal, when every folder refuses the write.
pub fn save_to_first_dir(
    artifact: &ReportArtifact,
    dirs: &[PathBuf],
) -> Result<PathBuf, ReportError> {
    let mut last = None;
    for dir in dirs {
        match save_to_dir(artifact, dir) {
            Ok(path) => return Ok(path),
            Err(source) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %source,
                    "Fallback folder refused the report"
                );
                last = Some(ReportError::Persistence {
                    path: dir.join(&artifact.file_name),
                    source,
                });
            }
        }
    }
    Err(last.unwrap_or_else(|| ReportError::Persistence {
        path: PathBuf::from(&artifact.file_name),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no fallback folder"),
    }))
}

/// One line per report row for on-screen preview: `term: locations` or
/// `term: -` when not found.
pub fn preview_lines(rows: &[ReportRow]) -> Vec<String> {
    rows.iter()
        .map(|r| {
            if r.where_found.is_empty() {
                format!("{}: -", r.term)
            } else {
                format!("{}: {}", r.term, r.where_found)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::MatchLocation;
    use crate::platform::storage::LocalStorage;
    use crate::platform::tabular::SpreadsheetIo;
    use chrono::{Local, Utc};

    fn sample() -> (TermSet, FoundMap) {
        let terms = TermSet::from_candidates(["INV001", "AMI1", "ZZZ"]);
        let mut found = FoundMap::new(&terms);
        found.record(0, MatchLocation::file_name("sub/INV001.pdf"));
        found.record(0, MatchLocation::pdf_page(2, "sub/INV001.pdf"));
        found.record(0, MatchLocation::file_name("sub/INV001.pdf"));
        found.record(1, MatchLocation::file_name("AMI100.pdf"));
        (terms, found)
    }

    #[test]
    fn test_build_report_rows_in_term_order() {
        let (terms, found) = sample();
        let rows = build_report(&terms, &found);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].term, "INV001");
        assert_eq!(rows[0].result, ReportResult::Found);
        assert_eq!(
            rows[0].where_found,
            "FILENAME: sub/INV001.pdf ; PDF_PAGE_2: sub/INV001.pdf"
        );
        assert_eq!(rows[1].where_found, "FILENAME: AMI100.pdf");
        assert_eq!(rows[2].result, ReportResult::NotFound);
        assert_eq!(rows[2].where_found, "");
    }

    #[test]
    fn test_build_report_with_map_from_other_term_order() {
        let (terms, _) = sample();
        let reordered = TermSet::from_candidates(["ZZZ", "AMI1", "INV001"]);
        let mut found = FoundMap::new(&reordered);
        found.record(2, MatchLocation::file_name("INV001.pdf"));

        let rows = build_report(&terms, &found);
        assert_eq!(rows[0].term, "INV001");
        assert_eq!(rows[0].where_found, "FILENAME: INV001.pdf");
        assert_eq!(rows[2].result, ReportResult::NotFound);
    }

    #[test]
    fn test_report_table_has_header() {
        let (terms, found) = sample();
        let table = report_table(&build_report(&terms, &found));
        assert_eq!(table.len(), terms.len() + 1);
        assert_eq!(table[0], ["searchword", "result", "where_found"]);
        assert_eq!(table[3], ["ZZZ", "NOT FOUND", ""]);
    }

    #[test]
    fn test_summarize_counts_terms() {
        let (terms, found) = sample();
        let mut summary = ScanSummary::default();
        summarize(&build_report(&terms, &found), &mut summary);
        assert_eq!(summary.terms_found, 2);
        assert_eq!(summary.terms_not_found, 1);
    }

    #[test]
    fn test_serialized_report_reads_back() {
        let (terms, found) = sample();
        let rows = build_report(&terms, &found);
        let artifact =
            serialize_report(&rows, &SpreadsheetIo, TabularFormat::Workbook, "search_report.xlsx")
                .unwrap();
        let table = SpreadsheetIo
            .parse_tabular(&artifact.bytes, TabularFormat::Workbook)
            .unwrap();
        assert_eq!(table[1][2], rows[0].where_found);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_persist_overwrites_previous_report() {
        let dest = tempfile::tempdir().unwrap();
        let storage = LocalStorage::default();
        let artifact = |bytes: &[u8]| ReportArtifact {
            file_name: "search_report.csv".to_string(),
            format: TabularFormat::Csv,
            bytes: bytes.to_vec(),
        };

        persist_report(artifact(b"first run, longer"), dest.path(), &storage, &Local::now());
        let outcome = persist_report(artifact(b"second"), dest.path(), &storage, &Local::now());

        let path = outcome.saved_path().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[test]
    fn test_persist_failure_offers_timestamped_download() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 15, 2).unwrap();
        let artifact = ReportArtifact {
            file_name: "search_report.xlsx".to_string(),
            format: TabularFormat::Workbook,
            bytes: vec![1, 2, 3],
        };

        match persist_report(artifact, &missing, &LocalStorage::default(), &now) {
            PersistOutcome::Download { artifact, reason } => {
                assert_eq!(artifact.file_name, "search_report_2024-03-09_141502.xlsx");
                assert_eq!(artifact.bytes, [1, 2, 3]);
                assert!(matches!(reason, ReportError::Persistence { .. }));
            }
            other => panic!("expected download, got {other:?}"),
        }
    }

    fn csv_artifact() -> ReportArtifact {
        ReportArtifact {
            file_name: "search_report_2024-03-09_141502.csv".to_string(),
            format: TabularFormat::Csv,
            bytes: b"searchword,result,where_found\n".to_vec(),
        }
    }

    #[test]
    fn test_save_to_first_dir_skips_refusing_folder() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where a folder is expected refuses every write.
        let blocker = dir.path().join("Downloads");
        std::fs::write(&blocker, "not a folder").unwrap();
        let second = dir.path().join("tmp");

        let dirs = [blocker.join("reports"), second.clone()];
        let path = save_to_first_dir(&csv_artifact(), &dirs).unwrap();
        assert_eq!(path, second.join("search_report_2024-03-09_141502.csv"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"searchword"));
    }

    #[test]
    fn test_save_to_first_dir_reports_last_refusal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let result = save_to_first_dir(&csv_artifact(), &[blocker.join("a"), blocker.join("b")]);
        match result {
            Err(ReportError::Persistence { path, .. }) => {
                assert!(path.starts_with(blocker.join("b")));
            }
            other => panic!("expected persistence error, got {other:?}"),
        }
        assert!(save_to_first_dir(&csv_artifact(), &[]).is_err());
    }

    #[test]
    fn test_preview_lines() {
        let (terms, found) = sample();
        let lines = preview_lines(&build_report(&terms, &found));
        assert_eq!(lines[2], "ZZZ: -");
        assert!(lines[1].starts_with("AMI1: FILENAME"));
    }
}
