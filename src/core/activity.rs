// TermSleuth - core/activity.rs
//
// User-facing activity log.
//
// Mid-scan recoverable problems (unreadable folders, broken PDFs, failed
// copies) are reported here rather than aborting the scan or interrupting
// the user. Every line is also forwarded to tracing so it reaches stderr
// and any configured subscriber.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Severity of an activity line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ActivityLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for activity lines.
pub trait ActivityLog: Send + Sync {
    fn append(&self, message: &str, level: ActivityLevel);
}

/// One retained activity line.
#[derive(Debug, Clone)]
pub struct ActivityLine {
    pub timestamp: DateTime<Local>,
    pub level: ActivityLevel,
    pub message: String,
}

impl fmt::Display for ActivityLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Activity log that forwards to tracing and keeps the most recent lines.
#[derive(Debug)]
pub struct TracingActivityLog {
    lines: Mutex<VecDeque<ActivityLine>>,
    max_lines: usize,
}

impl Default for TracingActivityLog {
    fn default() -> Self {
        Self::with_capacity(crate::util::constants::MAX_ACTIVITY_LINES)
    }
}

impl TracingActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain at most `max_lines` lines (minimum 1); oldest lines are dropped first.
    pub fn with_capacity(max_lines: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            max_lines: max_lines.max(1),
        }
    }

    /// Snapshot of the retained lines, oldest first.
    pub fn lines(&self) -> Vec<ActivityLine> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ActivityLine>> {
        // A panic while holding the lock cannot leave the deque half-updated,
        // so a poisoned lock is still safe to use.
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ActivityLog for TracingActivityLog {
    fn append(&self, message: &str, level: ActivityLevel) {
        match level {
            ActivityLevel::Info | ActivityLevel::Success => {
                tracing::info!(activity = ?level, "{message}")
            }
            ActivityLevel::Warning => tracing::warn!("{message}"),
            ActivityLevel::Error => tracing::error!("{message}"),
        }

        let mut lines = self.lock();
        if lines.len() >= self.max_lines {
            lines.pop_front();
        }
        lines.push_back(ActivityLine {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_clear() {
        let log = TracingActivityLog::new();
        log.append("Search started", ActivityLevel::Info);
        log.append("Cannot open 'a.pdf'", ActivityLevel::Warning);
        assert_eq!(log.len(), 2);

        let lines = log.lines();
        assert_eq!(lines[1].level, ActivityLevel::Warning);
        assert!(lines[0].to_string().ends_with("] Search started"));

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = TracingActivityLog::with_capacity(2);
        log.append("one", ActivityLevel::Info);
        log.append("two", ActivityLevel::Info);
        log.append("three", ActivityLevel::Info);
        let messages: Vec<String> = log.lines().into_iter().map(|l| l.message).collect();
        assert_eq!(messages, ["two", "three"]);
    }
}
