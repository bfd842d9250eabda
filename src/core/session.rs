// TermSleuth - core/session.rs
//
// Per-scan mutable state: counters, cancel token, and progress.
//
// A fresh `ScanSession` is created for every scan and owned by the code
// driving that scan; the enumerator and match engine borrow it. Nothing is
// shared between sessions, so two scans can never interleave their counters.
//
// Cancellation is cooperative: `CancelToken` is a shared flag polled at the
// top of each directory-child and entry iteration. In-flight I/O for the
// current item always completes before the flag is honoured.

use crate::core::model::ScanSummary;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared cooperative cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `(done, total)` file counts for progress display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    /// Rounded percentage; 0 when there is nothing to do.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.done as f64 / self.total as f64) * 100.0).round() as u32
    }
}

type ProgressSink = Box<dyn FnMut(Progress) + Send>;

/// State of one scan from enumeration through report.
pub struct ScanSession {
    cancel: CancelToken,
    progress: Progress,
    progress_interval: usize,
    on_progress: Option<ProgressSink>,
    started: Instant,

    pub files_discovered: usize,
    pub files_scanned: usize,
    pub matches_found: usize,
    pub files_matched: usize,
    pub files_copied: usize,
    pub copy_failures: usize,
    pub extraction_failures: usize,
    pub skipped_subtrees: usize,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress)
            .field("files_scanned", &self.files_scanned)
            .field("matches_found", &self.matches_found)
            .finish_non_exhaustive()
    }
}

impl ScanSession {
    /// New session checkpointing progress every `progress_interval` files
    /// (minimum 1).
    pub fn new(cancel: CancelToken, progress_interval: usize) -> Self {
        Self {
            cancel,
            progress: Progress::default(),
            progress_interval: progress_interval.max(1),
            on_progress: None,
            started: Instant::now(),
            files_discovered: 0,
            files_scanned: 0,
            matches_found: 0,
            files_matched: 0,
            files_copied: 0,
            copy_failures: 0,
            extraction_failures: 0,
            skipped_subtrees: 0,
        }
    }

    /// Receive progress checkpoints.
    pub fn with_progress_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(Progress) + Send + 'static,
    {
        self.on_progress = Some(Box::new(sink));
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Start the matching phase over `total` files. Always checkpoints so the
    /// display shows `0 / total`.
    pub fn begin(&mut self, total: usize) {
        self.files_discovered = total;
        self.progress = Progress { done: 0, total };
        self.checkpoint();
    }

    /// Record one processed file. Checkpoints every `progress_interval`
    /// files and on the final file.
    pub fn file_done(&mut self) {
        self.files_scanned += 1;
        self.progress.done += 1;
        let at_interval = self.progress.done % self.progress_interval == 0;
        if at_interval || self.progress.done == self.progress.total {
            self.checkpoint();
        }
    }

    fn checkpoint(&mut self) {
        let progress = self.progress;
        tracing::trace!(done = progress.done, total = progress.total, "Progress checkpoint");
        if let Some(sink) = self.on_progress.as_mut() {
            sink(progress);
        }
    }

    /// Counters as a summary. Term totals are filled in by the report stage.
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            files_discovered: self.files_discovered,
            files_scanned: self.files_scanned,
            matches_found: self.matches_found,
            files_matched: self.files_matched,
            files_copied: self.files_copied,
            copy_failures: self.copy_failures,
            extraction_failures: self.extraction_failures,
            skipped_subtrees: self.skipped_subtrees,
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            cancelled: self.is_cancelled(),
            ..Default::default()
        }
    }
}
