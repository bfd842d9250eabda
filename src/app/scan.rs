// TermSleuth - app/scan.rs
//
// Scan lifecycle management. Runs enumeration, matching and reporting on a
// background thread, sending progress messages to the caller via an mpsc
// channel.
//
// Architecture:
//   - `ScanManager` lives on the caller's thread; `run_scan` runs on a
//     background thread (or synchronously, for tests and batch callers).
//   - A `CancelToken` lets the caller stop the scan cooperatively.
//   - All cross-thread communication is via `ScanProgress` channel messages.
//   - Only one scan may be in flight; a second start is rejected with
//     `ScanError::Busy` rather than cancelling the first.
//
// The scan itself is a strictly sequential loop. The thread exists only so
// the caller stays free to poll progress and request cancellation.

use crate::core::activity::{ActivityLevel, ActivityLog};
use crate::core::discovery::{self, DiscoveryConfig};
use crate::core::matcher::{MatchEngine, ScanContext};
use crate::core::model::{FoundMap, ReportRow, ScanOptions, ScanSummary, TermSet};
use crate::core::report::{self, PersistOutcome};
use crate::core::session::{CancelToken, ScanSession};
use crate::platform::document::{DocumentExtractor, PdfExtractor};
use crate::platform::storage::{LocalStorage, StorageProvider};
use crate::platform::tabular::{SpreadsheetIo, TabularFormat, TabularIo};
use crate::util::error::{ScanError, TermSleuthError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

// =============================================================================
// Request, services, messages
// =============================================================================

/// Everything one scan needs, validated by `Workspace::scan_request`.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub terms: TermSet,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub options: ScanOptions,
    pub discovery: DiscoveryConfig,
    pub report_file_name: String,
    pub report_format: TabularFormat,
}

/// Shared collaborators injected into a scan.
#[derive(Clone)]
pub struct ScanServices {
    pub storage: Arc<dyn StorageProvider>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub tabular: Arc<dyn TabularIo>,
    pub log: Arc<dyn ActivityLog>,
}

impl ScanServices {
    /// Local filesystem, lopdf and spreadsheet backends.
    pub fn local(log: Arc<dyn ActivityLog>, large_file_threshold: u64) -> Self {
        Self {
            storage: Arc::new(LocalStorage::new(large_file_threshold)),
            extractor: Arc::new(PdfExtractor),
            tabular: Arc::new(SpreadsheetIo),
            log,
        }
    }
}

/// Result of a scan that produced a report (completed or cancelled).
#[derive(Debug)]
pub struct ScanOutcome {
    pub found: FoundMap,
    pub rows: Vec<ReportRow>,
    pub persist: PersistOutcome,
    pub summary: ScanSummary,
}

impl ScanOutcome {
    pub fn cancelled(&self) -> bool {
        self.summary.cancelled
    }
}

/// Progress message sent from the scan thread.
#[derive(Debug)]
pub enum ScanProgress {
    EnumerationStarted,
    EnumerationCompleted { total: usize },
    Progress { done: usize, total: usize },
    /// A recoverable problem that was logged to the activity log.
    Warning { message: String },
    Completed(Box<ScanOutcome>),
    Cancelled(Box<ScanOutcome>),
    Failed { error: String },
}

// =============================================================================
// ScanManager
// =============================================================================

/// Runs one scan at a time on a background thread.
pub struct ScanManager {
    /// Channel receiver for the caller to poll progress messages.
    progress_rx: Option<mpsc::Receiver<ScanProgress>>,

    /// Cancel token shared with the running scan.
    cancel: Option<CancelToken>,

    /// Set while a scan thread is running.
    busy: Arc<AtomicBool>,

    handle: Option<JoinHandle<()>>,
}

impl ScanManager {
    pub fn new() -> Self {
        Self {
            progress_rx: None,
            cancel: None,
            busy: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start a scan. Spawns the background thread immediately.
    ///
    /// # Errors
    /// `ScanError::Busy` if a scan is already in flight.
    pub fn start_scan(
        &mut self,
        request: ScanRequest,
        services: ScanServices,
    ) -> Result<(), ScanError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Scan start rejected, a scan is already running");
            return Err(ScanError::Busy);
        }

        // Reap the previous thread, which has already cleared `busy`.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        self.progress_rx = Some(rx);
        self.cancel = Some(cancel.clone());

        let busy = BusyGuard(Arc::clone(&self.busy));
        self.handle = Some(std::thread::spawn(move || {
            scan_thread(request, services, cancel, tx, busy);
        }));

        tracing::info!("Scan started");
        Ok(())
    }

    /// Request cancellation of the running scan. The scan stops at the next
    /// directory child or entry boundary and sends `ScanProgress::Cancelled`.
    pub fn cancel_scan(&self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
            tracing::info!("Scan cancel requested");
        }
    }

    /// Token for the current scan, for callers that cancel from another thread.
    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.cancel.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Poll for progress messages without blocking. Returns all pending messages.
    pub fn poll_progress(&self) -> Vec<ScanProgress> {
        let mut messages = Vec::new();
        if let Some(rx) = &self.progress_rx {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        messages
    }

    /// Block until the next progress message. `None` once the scan thread
    /// has exited and every message has been received.
    pub fn recv(&self) -> Option<ScanProgress> {
        self.progress_rx.as_ref()?.recv().ok()
    }

    /// Wait for the scan thread to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Scan thread panicked");
            }
        }
    }
}

impl Default for ScanManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the busy flag when dropped, including on panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Activity log wrapper that also forwards warnings over the channel.
struct ForwardingLog {
    inner: Arc<dyn ActivityLog>,
    tx: mpsc::Sender<ScanProgress>,
}

impl ActivityLog for ForwardingLog {
    fn append(&self, message: &str, level: ActivityLevel) {
        self.inner.append(message, level);
        if matches!(level, ActivityLevel::Warning | ActivityLevel::Error) {
            let _ = self.tx.send(ScanProgress::Warning {
                message: message.to_string(),
            });
        }
    }
}

fn scan_thread(
    request: ScanRequest,
    services: ScanServices,
    cancel: CancelToken,
    tx: mpsc::Sender<ScanProgress>,
    busy: BusyGuard,
) {
    let services = ScanServices {
        log: Arc::new(ForwardingLog {
            inner: Arc::clone(&services.log),
            tx: tx.clone(),
        }),
        ..services
    };

    let tx_progress = tx.clone();
    let mut session = ScanSession::new(cancel, request.options.progress_interval)
        .with_progress_sink(move |p| {
            // Non-fatal: the receiver may have been dropped.
            let _ = tx_progress.send(ScanProgress::Progress {
                done: p.done,
                total: p.total,
            });
        });

    let result = run_scan(&request, &services, &mut session, |event| {
        let _ = tx.send(event);
    });

    // Clear `busy` before the final message so a caller reacting to it can
    // start the next scan straight away.
    drop(busy);

    let message = match result {
        Ok(outcome) if outcome.cancelled() => ScanProgress::Cancelled(Box::new(outcome)),
        Ok(outcome) => ScanProgress::Completed(Box::new(outcome)),
        Err(e) => ScanProgress::Failed {
            error: e.to_string(),
        },
    };
    let _ = tx.send(message);
}

// =============================================================================
// Scan pipeline
// =============================================================================

/// Full scan pipeline: enumerate -> match (and copy) -> report -> persist.
///
/// Phase events go to `on_event`; per-file progress goes through the
/// session's progress sink.
///
/// # Errors
/// Only when the root cannot be enumerated, or when the report cannot be
/// serialised even as CSV. Everything else is logged and the scan continues.
/// A failed report write is not an error: the outcome carries the artifact
/// for download.
pub fn run_scan<F>(
    request: &ScanRequest,
    services: &ScanServices,
    session: &mut ScanSession,
    mut on_event: F,
) -> Result<ScanOutcome, TermSleuthError>
where
    F: FnMut(ScanProgress),
{
    let log = services.log.as_ref();

    // -------------------------------------------------------------------------
    // Phase 1: Enumeration
    // -------------------------------------------------------------------------
    on_event(ScanProgress::EnumerationStarted);
    log.append(
        &format!(
            "Search started in '{}' for {} terms",
            request.source_root.display(),
            request.terms.len()
        ),
        ActivityLevel::Info,
    );

    let enumeration = discovery::enumerate(
        &request.source_root,
        services.storage.as_ref(),
        &request.discovery,
        session.cancel_token(),
        log,
        |entry, count| tracing::trace!(file = %entry.relative_path, count, "File enumerated"),
    )
    .map_err(|e| {
        log.append(&e.to_string(), ActivityLevel::Error);
        e
    })?;
    session.skipped_subtrees = enumeration.skipped_subtrees;
    on_event(ScanProgress::EnumerationCompleted {
        total: enumeration.entries.len(),
    });
    log.append(
        &format!("{} files found", enumeration.entries.len()),
        ActivityLevel::Info,
    );

    // -------------------------------------------------------------------------
    // Phase 2: Matching and copy
    // -------------------------------------------------------------------------
    // Copies always land under the request's destination.
    let options = ScanOptions {
        destination_root: Some(request.destination_root.clone()),
        ..request.options.clone()
    };
    let engine = MatchEngine::new(&request.terms, &options);
    let ctx = ScanContext {
        storage: services.storage.as_ref(),
        extractor: services.extractor.as_ref(),
        log,
    };
    let found = engine.scan(&enumeration.entries, session, ctx);

    // -------------------------------------------------------------------------
    // Phase 3: Report
    // -------------------------------------------------------------------------
    // Built from whatever was found, including after a cancel.
    let rows = report::build_report(&request.terms, &found);
    let mut summary = session.summary();
    report::summarize(&rows, &mut summary);

    let artifact = match report::serialize_report(
        &rows,
        services.tabular.as_ref(),
        request.report_format,
        &request.report_file_name,
    ) {
        Ok(artifact) => artifact,
        Err(e) if request.report_format != TabularFormat::Csv => {
            log.append(
                &format!("{e}. Writing the report as CSV instead"),
                ActivityLevel::Warning,
            );
            report::serialize_report(
                &rows,
                services.tabular.as_ref(),
                TabularFormat::Csv,
                &TabularFormat::Csv.file_name(&request.report_file_name),
            )?
        }
        Err(e) => return Err(e.into()),
    };
    let persist = report::persist_report(
        artifact,
        &request.destination_root,
        services.storage.as_ref(),
        &chrono::Local::now(),
    );

    match &persist {
        PersistOutcome::Saved { path } => log.append(
            &format!("Report saved to '{}'", path.display()),
            ActivityLevel::Success,
        ),
        PersistOutcome::Download { artifact, reason } => log.append(
            &format!("{reason}. Report available as '{}'", artifact.file_name),
            ActivityLevel::Warning,
        ),
    }

    if summary.cancelled {
        log.append(
            &format!(
                "Search cancelled after {} of {} files",
                summary.files_scanned, summary.files_discovered
            ),
            ActivityLevel::Warning,
        );
    } else {
        log.append(
            &format!(
                "Search complete: {} of {} terms found, {} files copied",
                summary.terms_found,
                rows.len(),
                summary.files_copied
            ),
            ActivityLevel::Success,
        );
    }

    tracing::info!(
        files = summary.files_scanned,
        terms_found = summary.terms_found,
        terms_not_found = summary.terms_not_found,
        copied = summary.files_copied,
        copy_failures = summary.copy_failures,
        extraction_failures = summary.extraction_failures,
        duration_ms = summary.duration_ms,
        cancelled = summary.cancelled,
        "Scan finished"
    );

    Ok(ScanOutcome {
        found,
        rows,
        persist,
        summary,
    })
}
