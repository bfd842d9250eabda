// TermSleuth - core/matcher.rs
//
// Match engine: tests every enumerated file against every term, by file name
// and (for documents) page by page, and optionally copies matched files into
// a mirror of the source layout under the destination root.
//
// Processing is strictly sequential, one entry at a time, so at most one
// document is open at any moment. The document handle and its page text are
// dropped at the end of each entry.
//
// Per entry, in order:
//   1. cancel check (stop before touching the entry)
//   2. file-name test, all terms
//   3. page text test, all pages, all terms (documents only)
//   4. cancel check (an entry interrupted here contributes nothing)
//   5. record hits, then copy if enabled and the entry matched
//   6. progress checkpoint
//
// Extraction and copy failures are logged to the activity log and counted;
// they never abort the scan.

use crate::core::activity::{ActivityLevel, ActivityLog};
use crate::core::model::{Entry, FoundMap, MatchLocation, MatchMode, ScanOptions, TermSet};
use crate::core::session::ScanSession;
use crate::platform::document::DocumentExtractor;
use crate::platform::storage::{FileBytes, StorageProvider};
use crate::util::error::CopyError;
use std::path::{Path, PathBuf};

/// Collaborators the engine reads from and writes to.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub storage: &'a dyn StorageProvider,
    pub extractor: &'a dyn DocumentExtractor,
    pub log: &'a dyn ActivityLog,
}

/// A term prepared for repeated comparison.
#[derive(Debug)]
enum Matcher {
    Substring(String),
    Word(regex::Regex),
}

impl Matcher {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Substring(needle) => text.contains(needle.as_str()),
            Matcher::Word(re) => re.is_match(text),
        }
    }
}

/// Build a whole-word pattern. A boundary is only required on a side where
/// the term itself starts or ends with a word character, so terms such as
/// `#42` or `C++` still match.
fn word_pattern(term: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = if term.chars().next().is_some_and(is_word) { r"\b" } else { "" };
    let trail = if term.chars().last().is_some_and(is_word) { r"\b" } else { "" };
    format!("{lead}{}{trail}", regex::escape(term))
}

/// Term matcher for one scan.
#[derive(Debug)]
pub struct MatchEngine {
    terms: TermSet,
    matchers: Vec<Matcher>,
    options: ScanOptions,
}

impl MatchEngine {
    pub fn new(terms: &TermSet, options: &ScanOptions) -> Self {
        let matchers = terms
            .iter()
            .map(|term| {
                let needle = if options.case_insensitive {
                    term.to_lowercase()
                } else {
                    term.clone()
                };
                match options.match_mode {
                    MatchMode::Substring => Matcher::Substring(needle),
                    MatchMode::Word => match regex::Regex::new(&word_pattern(&needle)) {
                        Ok(re) => Matcher::Word(re),
                        Err(e) => {
                            tracing::warn!(
                                term = %term,
                                error = %e,
                                "Cannot build word pattern, using substring match"
                            );
                            Matcher::Substring(needle)
                        }
                    },
                }
            })
            .collect();

        Self {
            terms: terms.clone(),
            matchers,
            options: options.clone(),
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Indices (term-set order) of every term found in `text`.
    pub fn matching_terms(&self, text: &str) -> Vec<usize> {
        let lowered;
        let haystack = if self.options.case_insensitive {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };
        self.matchers
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_match(haystack))
            .map(|(i, _)| i)
            .collect()
    }

    /// Scan `entries` in order and return every location found.
    ///
    /// Stops at the next entry boundary once the session's cancel token is
    /// set; the returned map then covers only fully processed entries.
    pub fn scan(
        &self,
        entries: &[Entry],
        session: &mut ScanSession,
        ctx: ScanContext<'_>,
    ) -> FoundMap {
        let mut found = FoundMap::new(&self.terms);
        session.begin(entries.len());

        tracing::info!(
            files = entries.len(),
            terms = self.terms.len(),
            mode = ?self.options.match_mode,
            case_insensitive = self.options.case_insensitive,
            copy = self.options.copy_matches,
            "Matching started"
        );

        for entry in entries {
            if session.is_cancelled() {
                tracing::debug!(done = session.progress().done, "Matching cancelled by request");
                break;
            }

            let mut hits: Vec<(usize, MatchLocation)> = self
                .matching_terms(&entry.name)
                .into_iter()
                .map(|i| (i, MatchLocation::file_name(&entry.relative_path)))
                .collect();

            let mut cached = None;
            if self.options.is_document(entry) {
                cached = self.scan_document(entry, &mut hits, session, ctx);
            }

            if session.is_cancelled() {
                tracing::debug!(file = %entry.relative_path, "Cancelled mid-entry, discarding");
                break;
            }

            if !hits.is_empty() {
                tracing::debug!(file = %entry.relative_path, hits = hits.len(), "File matched");
                session.matches_found += hits.len();
                session.files_matched += 1;
                for (index, location) in hits {
                    found.record(index, location);
                }
                if self.options.copy_matches {
                    self.copy_matched(entry, cached.as_deref(), session, ctx);
                }
            }

            session.file_done();
        }

        tracing::info!(
            scanned = session.files_scanned,
            matched = session.files_matched,
            locations = found.total_locations(),
            "Matching finished"
        );
        found
    }

    /// Test every page of a document. Returns the file bytes so a later copy
    /// does not read the file twice.
    fn scan_document(
        &self,
        entry: &Entry,
        hits: &mut Vec<(usize, MatchLocation)>,
        session: &mut ScanSession,
        ctx: ScanContext<'_>,
    ) -> Option<FileBytes> {
        let bytes = match ctx.storage.read_bytes(&entry.handle) {
            Ok(b) => b,
            Err(e) => {
                session.extraction_failures += 1;
                ctx.log.append(
                    &format!("Cannot read '{}': {e}", entry.relative_path),
                    ActivityLevel::Warning,
                );
                return None;
            }
        };

        let document = match ctx.extractor.open(&bytes) {
            Ok(d) => d,
            Err(e) => {
                session.extraction_failures += 1;
                ctx.log.append(
                    &format!("Cannot extract text from '{}': {e}", entry.relative_path),
                    ActivityLevel::Warning,
                );
                return Some(bytes);
            }
        };

        for index in 0..document.page_count() {
            let text = match document.page_text(index) {
                Ok(t) => t,
                Err(e) => {
                    session.extraction_failures += 1;
                    ctx.log.append(
                        &format!("Skipping page in '{}': {e}", entry.relative_path),
                        ActivityLevel::Warning,
                    );
                    continue;
                }
            };
            hits.extend(
                self.matching_terms(&text)
                    .into_iter()
                    .map(|i| (i, MatchLocation::pdf_page(index + 1, &entry.relative_path))),
            );
        }

        Some(bytes)
    }

    fn copy_matched(
        &self,
        entry: &Entry,
        cached: Option<&[u8]>,
        session: &mut ScanSession,
        ctx: ScanContext<'_>,
    ) {
        let result = match self.options.destination_root.as_deref() {
            Some(dest_root) => copy_entry(entry, dest_root, cached, ctx.storage),
            None => Err(CopyError::NoDestination {
                path: entry.relative_path.clone(),
            }),
        };
        match result {
            Ok(target) => {
                session.files_copied += 1;
                tracing::debug!(file = %entry.relative_path, target = %target.display(), "Copied");
            }
            Err(e) => {
                session.copy_failures += 1;
                ctx.log.append(&e.to_string(), ActivityLevel::Warning);
            }
        }
    }
}

/// Copy `entry` to `<dest_root>/<relative_path>`, creating intermediate
/// directories. An existing file at the target is overwritten.
pub fn copy_entry(
    entry: &Entry,
    dest_root: &Path,
    cached: Option<&[u8]>,
    storage: &dyn StorageProvider,
) -> Result<PathBuf, CopyError> {
    let segments: Vec<&str> = entry.segments().collect();
    let Some((file_name, dirs)) = segments.split_last() else {
        return Err(CopyError::Write {
            path: entry.relative_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty relative path"),
        });
    };

    // Read before creating anything so a read failure leaves no empty file.
    let owned;
    let bytes = match cached {
        Some(b) => b,
        None => {
            owned = storage
                .read_bytes(&entry.handle)
                .map_err(|source| CopyError::Read {
                    path: entry.relative_path.clone(),
                    source,
                })?;
            &*owned
        }
    };

    let mut dir = dest_root.to_path_buf();
    for name in dirs {
        dir = storage
            .ensure_directory(&dir, name)
            .map_err(|source| CopyError::CreateDir {
                path: entry.relative_path.clone(),
                source,
            })?;
    }

    let target = storage
        .create_or_open_file(&dir, file_name)
        .map_err(|source| CopyError::Write {
            path: entry.relative_path.clone(),
            source,
        })?;

    // Destination inside the source tree at the same place: the file is
    // already where it belongs, and rewriting it would truncate the bytes
    // being read.
    if target == entry.handle {
        return Ok(target);
    }

    storage
        .write_bytes(&target, bytes)
        .map_err(|source| CopyError::Write {
            path: entry.relative_path.clone(),
            source,
        })?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::activity::TracingActivityLog;
    use crate::core::session::CancelToken;
    use crate::platform::document::DocumentHandle;
    use crate::platform::storage::LocalStorage;
    use crate::util::error::ExtractionError;
    use std::fs;

    /// Treats file bytes as UTF-8 with pages separated by form feeds.
    /// Bytes starting with `BROKEN` fail to open; a page reading `BAD`
    /// fails to extract.
    struct FormFeedExtractor;

    struct FormFeedDoc(Vec<String>);

    impl DocumentHandle for FormFeedDoc {
        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn page_text(&self, index: usize) -> Result<String, ExtractionError> {
            match self.0.get(index).map(String::as_str) {
                Some("BAD") => Err(ExtractionError::Page {
                    index,
                    source: "garbled".into(),
                }),
                Some(text) => Ok(text.to_string()),
                None => Err(ExtractionError::PageOutOfRange {
                    index,
                    page_count: self.0.len(),
                }),
            }
        }
    }

    impl DocumentExtractor for FormFeedExtractor {
        fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ExtractionError> {
            let text = String::from_utf8_lossy(bytes);
            if text.starts_with("BROKEN") {
                return Err(ExtractionError::Open {
                    source: "not a document".into(),
                });
            }
            Ok(Box::new(FormFeedDoc(
                text.split('\u{c}').map(str::to_string).collect(),
            )))
        }
    }

    fn entry(root: &Path, rel: &str) -> Entry {
        Entry {
            handle: root.join(rel),
            name: rel.rsplit('/').next().unwrap().to_string(),
            relative_path: rel.to_string(),
        }
    }

    fn write(root: &Path, rel: &str, contents: &str) -> Entry {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        entry(root, rel)
    }

    fn scan_with(
        terms: &[&str],
        options: ScanOptions,
        entries: &[Entry],
        log: &TracingActivityLog,
    ) -> (FoundMap, ScanSession) {
        let engine = MatchEngine::new(&TermSet::from_candidates(terms.iter().copied()), &options);
        let mut session = ScanSession::new(CancelToken::new(), 5);
        let storage = LocalStorage::default();
        let ctx = ScanContext {
            storage: &storage,
            extractor: &FormFeedExtractor,
            log,
        };
        let found = engine.scan(entries, &mut session, ctx);
        (found, session)
    }

    fn locations(found: &FoundMap, term: &str) -> Vec<String> {
        found
            .get(term)
            .unwrap()
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_filename_then_pages() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![write(
            dir.path(),
            "sub/INV001.pdf",
            "cover\u{c}Invoice INV001\u{c}INV001 again",
        )];
        let log = TracingActivityLog::new();
        let (found, session) = scan_with(&["INV001"], ScanOptions::default(), &entries, &log);

        assert_eq!(
            locations(&found, "INV001"),
            [
                "FILENAME: sub/INV001.pdf",
                "PDF_PAGE_2: sub/INV001.pdf",
                "PDF_PAGE_3: sub/INV001.pdf"
            ]
        );
        assert_eq!(session.files_scanned, 1);
        assert_eq!(session.files_matched, 1);
        assert_eq!(session.matches_found, 3);
    }

    #[test]
    fn test_non_document_only_checks_name() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![write(dir.path(), "notes.txt", "INV001 inside")];
        let log = TracingActivityLog::new();
        let (found, _) = scan_with(&["INV001"], ScanOptions::default(), &entries, &log);
        assert!(found.get("INV001").unwrap().is_empty());
    }

    #[test]
    fn test_substring_containment_default() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![write(dir.path(), "AMI100.txt", "")];
        let log = TracingActivityLog::new();
        let (found, _) = scan_with(&["AMI1"], ScanOptions::default(), &entries, &log);
        assert_eq!(locations(&found, "AMI1"), ["FILENAME: AMI100.txt"]);
    }

    #[test]
    fn test_word_mode_requires_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            write(dir.path(), "AMI100.txt", ""),
            write(dir.path(), "AMI1 scan.txt", ""),
        ];
        let options = ScanOptions {
            match_mode: MatchMode::Word,
            ..Default::default()
        };
        let log = TracingActivityLog::new();
        let (found, _) = scan_with(&["AMI1"], options, &entries, &log);
        assert_eq!(locations(&found, "AMI1"), ["FILENAME: AMI1 scan.txt"]);
    }

    #[test]
    fn test_word_pattern_skips_boundary_on_symbols() {
        let cpp = regex::Regex::new(&word_pattern("C++")).unwrap();
        assert!(cpp.is_match("notes on C++ templates"));
        assert!(cpp.is_match("C++."));
        assert!(!cpp.is_match("ABC++"));

        let ticket = regex::Regex::new(&word_pattern("#42")).unwrap();
        assert!(ticket.is_match("ref #42."));
        assert!(ticket.is_match("x#42"));
        assert!(!ticket.is_match("#420"));
    }

    #[test]
    fn test_case_sensitivity() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![write(dir.path(), "inv001.txt", "")];
        let log = TracingActivityLog::new();

        let (found, _) = scan_with(&["INV001"], ScanOptions::default(), &entries, &log);
        assert!(found.get("INV001").unwrap().is_empty());

        let options = ScanOptions {
            case_insensitive: true,
            ..Default::default()
        };
        let (found, _) = scan_with(&["INV001"], options, &entries, &log);
        assert_eq!(locations(&found, "INV001"), ["FILENAME: inv001.txt"]);
    }

    #[test]
    fn test_extraction_failures_are_logged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            write(dir.path(), "broken.pdf", "BROKEN INV001"),
            write(dir.path(), "partial.pdf", "BAD\u{c}INV001 here"),
            write(dir.path(), "INV001.pdf", "BROKEN"),
        ];
        let log = TracingActivityLog::new();
        let (found, session) = scan_with(&["INV001"], ScanOptions::default(), &entries, &log);

        assert_eq!(
            locations(&found, "INV001"),
            ["PDF_PAGE_2: partial.pdf", "FILENAME: INV001.pdf"]
        );
        assert_eq!(session.extraction_failures, 3);
        assert_eq!(session.files_scanned, 3);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_copy_mirrors_relative_path() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let entries = vec![
            write(src.path(), "a/b/INV001.pdf", "cover"),
            write(src.path(), "a/other.pdf", "nothing"),
        ];
        let options = ScanOptions {
            copy_matches: true,
            destination_root: Some(dest.path().to_path_buf()),
            ..Default::default()
        };
        let log = TracingActivityLog::new();
        let (_, session) = scan_with(&["INV001"], options, &entries, &log);

        assert_eq!(session.files_copied, 1);
        assert_eq!(
            fs::read_to_string(dest.path().join("a/b/INV001.pdf")).unwrap(),
            "cover"
        );
        assert!(!dest.path().join("a/other.pdf").exists());
    }

    #[test]
    fn test_copy_failure_is_counted_and_scan_continues() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        // A file where the "a" directory must go blocks the first copy.
        fs::write(dest.path().join("a"), "blocker").unwrap();
        let entries = vec![
            write(src.path(), "a/INV001.txt", "x"),
            write(src.path(), "INV001-2.txt", "y"),
        ];
        let options = ScanOptions {
            copy_matches: true,
            destination_root: Some(dest.path().to_path_buf()),
            ..Default::default()
        };
        let log = TracingActivityLog::new();
        let (found, session) = scan_with(&["INV001"], options, &entries, &log);

        assert_eq!(found.get("INV001").unwrap().len(), 2);
        assert_eq!(session.copy_failures, 1);
        assert_eq!(session.files_copied, 1);
        assert!(dest.path().join("INV001-2.txt").exists());
    }

    #[test]
    fn test_copy_into_source_tree_keeps_file() {
        let src = tempfile::tempdir().unwrap();
        let entries = vec![write(src.path(), "INV001.pdf", "original")];
        let options = ScanOptions {
            copy_matches: true,
            destination_root: Some(src.path().to_path_buf()),
            ..Default::default()
        };
        let log = TracingActivityLog::new();
        let (_, session) = scan_with(&["INV001"], options, &entries, &log);
        assert_eq!(session.files_copied, 1);
        assert_eq!(
            fs::read_to_string(src.path().join("INV001.pdf")).unwrap(),
            "original"
        );
    }

    #[test]
    fn test_cancelled_session_scans_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![write(dir.path(), "INV001.txt", "")];
        let terms = TermSet::from_candidates(["INV001"]);
        let engine = MatchEngine::new(&terms, &ScanOptions::default());
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut session = ScanSession::new(cancel, 5);
        let log = TracingActivityLog::new();
        let storage = LocalStorage::default();
        let found = engine.scan(
            &entries,
            &mut session,
            ScanContext {
                storage: &storage,
                extractor: &FormFeedExtractor,
                log: &log,
            },
        );
        assert_eq!(found.total_locations(), 0);
        assert_eq!(session.files_scanned, 0);
        assert_eq!(found.len(), 1);
    }
    #[test]
    fn test_copy_without_destination_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![write(dir.path(), "INV001.txt", "x")];
        let options = ScanOptions {
            copy_matches: true,
            destination_root: None,
            ..Default::default()
        };
        let log = TracingActivityLog::new();
        let (found, session) = scan_with(&["INV001"], options, &entries, &log);

        assert_eq!(locations(&found, "INV001"), ["FILENAME: INV001.txt"]);
        assert_eq!(session.copy_failures, 1);
        assert_eq!(session.files_copied, 0);
        assert!(log.lines()[0].message.contains("no destination folder"));
    }

    /// Cancels the scan while the first page is being read.
    struct CancelOnPage(CancelToken);

    struct CancelOnPageDoc(CancelToken);

    impl DocumentHandle for CancelOnPageDoc {
        fn page_count(&self) -> usize {
            1
        }

        fn page_text(&self, _index: usize) -> Result<String, ExtractionError> {
            self.0.cancel();
            Ok("INV001 on the first page".to_string())
        }
    }

    impl DocumentExtractor for CancelOnPage {
        fn open(&self, _bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ExtractionError> {
            Ok(Box::new(CancelOnPageDoc(self.0.clone())))
        }
    }

    #[test]
    fn test_cancel_between_detection_and_copy_discards_entry() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let entries = vec![
            write(src.path(), "a/INV001.pdf", "%PDF"),
            write(src.path(), "INV001-later.txt", "x"),
        ];
        let options = ScanOptions {
            copy_matches: true,
            destination_root: Some(dest.path().to_path_buf()),
            ..Default::default()
        };
        let engine = MatchEngine::new(&TermSet::from_candidates(["INV001"]), &options);
        let cancel = CancelToken::new();
        let mut session = ScanSession::new(cancel.clone(), 5);
        let log = TracingActivityLog::new();
        let storage = LocalStorage::default();
        let found = engine.scan(
            &entries,
            &mut session,
            ScanContext {
                storage: &storage,
                extractor: &CancelOnPage(cancel),
                log: &log,
            },
        );

        // Both the file-name and the page hit were detected, then dropped.
        assert!(found.get("INV001").unwrap().is_empty());
        assert_eq!(session.files_copied, 0);
        assert_eq!(session.files_matched, 0);
        assert_eq!(session.files_scanned, 0);
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }
}
