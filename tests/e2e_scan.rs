// TermSleuth - tests/e2e_scan.rs
//
// End-to-end tests for the scan pipeline: template load, enumeration,
// matching, copy, report, persistence.
//
// These tests exercise the real filesystem and the real spreadsheet reader
// and writer. Only document text extraction is faked (pages are the file's
// UTF-8 text split on form feeds) so page content is deterministic without
// checked-in PDF fixtures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use termsleuth::app::scan::{run_scan, ScanManager, ScanProgress, ScanRequest, ScanServices};
use termsleuth::app::state::Workspace;
use termsleuth::core::activity::{ActivityLevel, TracingActivityLog};
use termsleuth::core::model::ReportResult;
use termsleuth::core::report::PersistOutcome;
use termsleuth::core::session::{CancelToken, ScanSession};
use termsleuth::platform::config::AppConfig;
use termsleuth::platform::document::{DocumentExtractor, DocumentHandle};
use termsleuth::platform::storage::{ChildEntry, FileBytes, LocalStorage, StorageProvider};
use termsleuth::platform::tabular::{SpreadsheetIo, TabularFormat, TabularIo};
use termsleuth::util::error::{ExtractionError, ScanError};

// =============================================================================
// Helpers
// =============================================================================

struct TextPages;

struct TextDoc(Vec<String>);

impl DocumentHandle for TextDoc {
    fn page_count(&self) -> usize {
        self.0.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractionError> {
        self.0
            .get(index)
            .cloned()
            .ok_or(ExtractionError::PageOutOfRange {
                index,
                page_count: self.0.len(),
            })
    }
}

impl DocumentExtractor for TextPages {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ExtractionError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ExtractionError::Open {
            source: Box::new(e),
        })?;
        Ok(Box::new(TextDoc(
            text.split('\u{c}').map(str::to_string).collect(),
        )))
    }
}

/// Local storage that refuses to create files with a given name.
struct RefuseFile {
    inner: LocalStorage,
    refused: &'static str,
}

impl StorageProvider for RefuseFile {
    fn list_children(&self, dir: &Path) -> io::Result<Vec<ChildEntry>> {
        self.inner.list_children(dir)
    }

    fn is_directory(&self, handle: &Path) -> io::Result<bool> {
        self.inner.is_directory(handle)
    }

    fn read_bytes(&self, file: &Path) -> io::Result<FileBytes> {
        self.inner.read_bytes(file)
    }

    fn ensure_directory(&self, parent: &Path, name: &str) -> io::Result<PathBuf> {
        self.inner.ensure_directory(parent, name)
    }

    fn create_or_open_file(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        if name == self.refused {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only share"));
        }
        self.inner.create_or_open_file(dir, name)
    }

    fn write_bytes(&self, file: &Path, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_bytes(file, bytes)
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn services_with(storage: Arc<dyn StorageProvider>) -> (ScanServices, Arc<TracingActivityLog>) {
    let log = Arc::new(TracingActivityLog::new());
    let services = ScanServices {
        storage,
        extractor: Arc::new(TextPages),
        tabular: Arc::new(SpreadsheetIo),
        log: log.clone(),
    };
    (services, log)
}

fn services() -> (ScanServices, Arc<TracingActivityLog>) {
    services_with(Arc::new(LocalStorage::default()))
}

/// Workspace with a CSV template of `terms` and the given folders.
fn workspace(dir: &Path, terms: &[&str], src: &Path, dest: &Path, config: AppConfig) -> Workspace {
    let template = dir.join("terms.csv");
    let mut body = String::from("searchword\n");
    for t in terms {
        body.push_str(t);
        body.push('\n');
    }
    fs::write(&template, body).unwrap();

    let mut ws = Workspace::new(config);
    ws.load_template(&template, &SpreadsheetIo).unwrap();
    ws.source_root = Some(src.to_path_buf());
    ws.destination_root = Some(dest.to_path_buf());
    ws
}

fn run(request: &ScanRequest, services: &ScanServices) -> termsleuth::app::scan::ScanOutcome {
    let mut session = ScanSession::new(CancelToken::new(), request.options.progress_interval);
    run_scan(request, services, &mut session, |_| {}).unwrap()
}

fn sorted_locations(outcome: &termsleuth::app::scan::ScanOutcome, term: &str) -> Vec<String> {
    let mut locs: Vec<String> = outcome
        .found
        .get(term)
        .unwrap()
        .iter()
        .map(|l| l.to_string())
        .collect();
    locs.sort();
    locs
}

// =============================================================================
// Full scan
// =============================================================================

#[test]
fn test_invoice_scan_finds_copies_and_reports() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dest = tmp.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write(&src, "a/INV001_report.txt", "quarterly");
    write(&src, "b/unrelated.pdf", "see invoice inv001 for details");

    let config = AppConfig {
        case_insensitive: true,
        copy_matches: true,
        ..Default::default()
    };
    let ws = workspace(tmp.path(), &["INV001", "MISSING"], &src, &dest, config);
    let (services, log) = services();
    let outcome = run(&ws.scan_request().unwrap(), &services);

    assert_eq!(
        sorted_locations(&outcome, "INV001"),
        [
            "FILENAME: a/INV001_report.txt",
            "PDF_PAGE_1: b/unrelated.pdf"
        ]
    );

    let row = &outcome.rows[0];
    assert_eq!(row.term, "INV001");
    assert_eq!(row.result, ReportResult::Found);
    assert!(
        row.where_found == "FILENAME: a/INV001_report.txt ; PDF_PAGE_1: b/unrelated.pdf"
            || row.where_found == "PDF_PAGE_1: b/unrelated.pdf ; FILENAME: a/INV001_report.txt",
        "unexpected where_found: {}",
        row.where_found
    );
    assert_eq!(outcome.rows[1].result, ReportResult::NotFound);

    // Both matched files copied at their relative paths.
    assert_eq!(
        fs::read_to_string(dest.join("a/INV001_report.txt")).unwrap(),
        "quarterly"
    );
    assert!(dest.join("b/unrelated.pdf").exists());
    assert_eq!(outcome.summary.files_copied, 2);

    // Report saved under the destination, header + one row per term.
    let report_path = outcome.persist.saved_path().unwrap().to_path_buf();
    assert_eq!(report_path, dest.join("search_report.xlsx"));
    let table = SpreadsheetIo
        .parse_tabular(&fs::read(&report_path).unwrap(), TabularFormat::Workbook)
        .unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table[0], ["searchword", "result", "where_found"]);
    assert_eq!(table[1][2], row.where_found);
    assert_eq!(table[2][..2], ["MISSING", "NOT FOUND"]);

    assert!(log
        .lines()
        .iter()
        .any(|l| l.level == ActivityLevel::Success && l.message.starts_with("Search complete")));
}

#[test]
fn test_scan_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dest = tmp.path().join("dest");
    fs::create_dir_all(&dest).unwrap();
    write(&src, "x/AMI100.pdf", "cover\u{c}AMI1 on page two");
    write(&src, "y/notes.txt", "AMI1");

    let ws = workspace(tmp.path(), &["AMI1"], &src, &dest, AppConfig::default());
    let request = ws.scan_request().unwrap();
    let (services, _) = services();

    let first = run(&request, &services);
    let second = run(&request, &services);
    assert_eq!(first.found, second.found);
    assert_eq!(first.rows, second.rows);
    assert_eq!(
        first.rows[0].where_found,
        "FILENAME: x/AMI100.pdf ; PDF_PAGE_2: x/AMI100.pdf"
    );
}

#[test]
fn test_word_match_from_config() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    write(&src, "AMI100.txt", "");
    write(&src, "AMI1 final.txt", "");

    let config = AppConfig {
        match_mode: termsleuth::core::model::MatchMode::Word,
        ..Default::default()
    };
    let ws = workspace(tmp.path(), &["AMI1"], &src, tmp.path(), config);
    let (services, _) = services();
    let outcome = run(&ws.scan_request().unwrap(), &services);
    assert_eq!(outcome.rows[0].where_found, "FILENAME: AMI1 final.txt");
}

// =============================================================================
// Fallback, cancellation, preconditions
// =============================================================================

#[test]
fn test_unwritable_destination_falls_back_to_download() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    write(&src, "INV001.txt", "");

    let ws = workspace(tmp.path(), &["INV001"], &src, tmp.path(), AppConfig::default());
    let (services, log) = services_with(Arc::new(RefuseFile {
        inner: LocalStorage::default(),
        refused: "search_report.xlsx",
    }));
    let outcome = run(&ws.scan_request().unwrap(), &services);

    assert!(!outcome.cancelled());
    match &outcome.persist {
        PersistOutcome::Download { artifact, .. } => {
            assert!(artifact.file_name.starts_with("search_report_"));
            assert!(artifact.file_name.ends_with(".xlsx"));
            let table = SpreadsheetIo
                .parse_tabular(&artifact.bytes, TabularFormat::Workbook)
                .unwrap();
            assert_eq!(table[1][..2], ["INV001", "FOUND"]);

            let saved = termsleuth::core::report::save_to_dir(artifact, &tmp.path().join("dl"))
                .unwrap();
            assert!(saved.exists());
        }
        other => panic!("expected fallback download, got {other:?}"),
    }
    assert!(!tmp.path().join("search_report.xlsx").exists());
    assert!(log.lines().iter().any(|l| l.level == ActivityLevel::Warning));
}

#[test]
fn test_cancel_mid_scan_keeps_partial_results() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    for i in 0..5 {
        write(&src, &format!("INV00{i}.txt"), "");
    }

    let ws = workspace(tmp.path(), &["INV00"], &src, tmp.path(), AppConfig::default());
    let request = ws.scan_request().unwrap();
    let (services, _) = services();

    let token = CancelToken::new();
    let trigger = token.clone();
    let mut session = ScanSession::new(token, 1).with_progress_sink(move |p| {
        if p.done == 2 {
            trigger.cancel();
        }
    });
    let outcome = run_scan(&request, &services, &mut session, |_| {}).unwrap();

    assert!(outcome.cancelled());
    assert_eq!(outcome.summary.files_discovered, 5);
    assert_eq!(outcome.summary.files_scanned, 2);
    assert_eq!(outcome.found.get("INV00").unwrap().len(), 2);
    // The report is still produced for the partial run.
    assert_eq!(outcome.rows.len(), 1);
    assert!(outcome.persist.saved_path().is_some());
}

#[test]
fn test_manager_reports_progress_and_completion() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    for i in 0..7 {
        write(&src, &format!("f{i}.txt"), "");
    }

    let ws = workspace(tmp.path(), &["f3"], &src, tmp.path(), AppConfig::default());
    let (services, _) = services();
    let mut manager = ScanManager::new();
    manager
        .start_scan(ws.scan_request().unwrap(), services)
        .unwrap();

    let mut progress = Vec::new();
    let mut completed = None;
    while let Some(msg) = manager.recv() {
        match msg {
            ScanProgress::Progress { done, total } => progress.push((done, total)),
            ScanProgress::Completed(outcome) => completed = Some(outcome),
            ScanProgress::Failed { error } => panic!("scan failed: {error}"),
            _ => {}
        }
    }
    manager.join();

    // Default interval 5: start, every fifth file, and the last file.
    assert_eq!(progress, [(0, 7), (5, 7), (7, 7)]);
    let outcome = completed.unwrap();
    assert_eq!(outcome.rows[0].where_found, "FILENAME: f3.txt");
}

#[test]
fn test_missing_preconditions_block_scan() {
    let ws = Workspace::default();
    assert_eq!(ws.scan_request().unwrap_err(), ScanError::NoTemplate);
    assert_eq!(
        ScanError::NoTemplate.to_string(),
        "No template loaded. Upload a template first."
    );
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn test_xlsx_template_round_trip_through_workspace() {
    let tmp = tempfile::tempdir().unwrap();
    let rows: Vec<Vec<String>> = [["searchword"], [" INV001 "], [""], ["AMI1"], ["INV001"]]
        .iter()
        .map(|r| r.iter().map(|c| (*c).to_string()).collect())
        .collect();
    let bytes = SpreadsheetIo
        .write_tabular(&rows, "template", TabularFormat::Workbook)
        .unwrap();
    let path = tmp.path().join("terms.xlsx");
    fs::write(&path, bytes).unwrap();

    let mut ws = Workspace::default();
    assert_eq!(ws.load_template(&path, &SpreadsheetIo).unwrap(), 2);
    assert_eq!(ws.terms().as_slice(), ["INV001", "AMI1"]);
}
