//! Failure-diagnosis log buffer
//!
//! Every recorded entry is forwarded to `tracing` (where the subscriber's
//! display filter applies) and also retained, at any severity, in a bounded
//! ring buffer. When a test fails, the buffer holds the last moments before
//! the crash regardless of what the display filter showed.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use crate::config::Config;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber for the display channel, filtered
/// at the configured `log_level`.
///
/// `IRONCLICK_LOG` overrides the configured level. Call once at process
/// start; later calls are no-ops so test binaries can call it from every
/// test. The display filter never affects what [`DiagnosticLog`] retains.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env("IRONCLICK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Severity of a diagnostic entry, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        };
        write!(f, "{:<5}", name)
    }
}

/// One retained diagnostic entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Local>,
    pub thread: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} [{}] {}",
            self.severity,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.thread,
            self.message
        )
    }
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    entries: VecDeque<LogEntry>,
    warnings: u64,
}

/// Process-lifetime bounded ring buffer of recent log entries.
///
/// Construct one at process start and inject it; clones share the same
/// buffer. Append is the only mutation; entries are never reordered or
/// edited in place. Multiple sessions may append concurrently; cross-thread
/// ordering is best-effort and each entry is tagged with its thread.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    inner: Arc<Mutex<Inner>>,
}

impl DiagnosticLog {
    /// Default retention, enough context to diagnose most failures
    pub const DEFAULT_CAPACITY: usize = 20;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity,
                entries: VecDeque::with_capacity(capacity),
                warnings: 0,
            })),
        }
    }

    /// Append an entry, evicting the oldest beyond capacity, and forward it
    /// to the tracing subscriber. Severity filtering is the subscriber's
    /// concern only; retention here is unconditional.
    pub fn record<S: Into<String>>(&self, severity: Severity, message: S) {
        let message = message.into();
        match severity {
            Severity::Trace => tracing::trace!("{}", message),
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warn => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }

        let entry = LogEntry {
            severity,
            message,
            timestamp: Local::now(),
            thread: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
        };

        let mut inner = self.inner.lock().expect("diagnostic log poisoned");
        if inner.entries.len() == inner.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
        if severity >= Severity::Warn {
            inner.warnings += 1;
        }
    }

    pub fn trace<S: Into<String>>(&self, message: S) {
        self.record(Severity::Trace, message);
    }

    pub fn debug<S: Into<String>>(&self, message: S) {
        self.record(Severity::Debug, message);
    }

    pub fn info<S: Into<String>>(&self, message: S) {
        self.record(Severity::Info, message);
    }

    pub fn warn<S: Into<String>>(&self, message: S) {
        self.record(Severity::Warn, message);
    }

    pub fn error<S: Into<String>>(&self, message: S) {
        self.record(Severity::Error, message);
    }

    /// Entries at or above Warn recorded since construction or the last reset.
    /// Eviction from the ring does not decrement this.
    pub fn warnings(&self) -> u64 {
        self.inner.lock().expect("diagnostic log poisoned").warnings
    }

    /// Snapshot of the retained entries, oldest first
    pub fn recent(&self) -> Vec<LogEntry> {
        self.inner
            .lock()
            .expect("diagnostic log poisoned")
            .entries
            .iter()
            .cloned()
            .collect()
    }

    /// Format the retained entries for the failure channel and write them to
    /// stderr. Returns the formatted dump so test harnesses can attach it.
    pub fn dump_recent(&self) -> String {
        let mut out = String::from("All recent log messages before failure:\n");
        for entry in self.recent() {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        eprint!("{}", out);
        out
    }

    /// Clear the buffer and the warnings counter. Used between independent
    /// test runs sharing a process.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("diagnostic log poisoned");
        inner.entries.clear();
        inner.warnings = 0;
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_honors_config_and_is_idempotent() {
        let config = Config {
            log_level: "debug".to_string(),
            ..Config::default()
        };
        init_tracing(&config);
        init_tracing(&config);

        // display filtering never affects retention
        let log = DiagnosticLog::new();
        log.trace("below any display threshold");
        assert_eq!(log.recent().len(), 1);
    }

    #[test]
    fn test_ring_evicts_oldest_keeps_order() {
        let log = DiagnosticLog::with_capacity(20);
        for i in 0..25 {
            log.info(format!("message {}", i));
        }

        let recent = log.recent();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].message, "message 5");
        assert_eq!(recent[19].message, "message 24");
    }

    #[test]
    fn test_warning_counter_survives_eviction() {
        let log = DiagnosticLog::with_capacity(20);
        for i in 0..25 {
            if i % 2 == 0 {
                log.warn(format!("warn {}", i));
            } else {
                log.debug(format!("debug {}", i));
            }
        }

        // 13 even indices in 0..25, regardless of what was evicted
        assert_eq!(log.warnings(), 13);
    }

    #[test]
    fn test_error_counts_as_warning() {
        let log = DiagnosticLog::new();
        log.error("boom");
        log.info("fine");
        assert_eq!(log.warnings(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let log = DiagnosticLog::new();
        log.warn("warn");
        log.info("info");
        log.reset();
        assert_eq!(log.warnings(), 0);
        assert!(log.recent().is_empty());
    }

    #[test]
    fn test_clones_share_buffer() {
        let log = DiagnosticLog::new();
        let clone = log.clone();
        clone.warn("from clone");
        assert_eq!(log.warnings(), 1);
        assert_eq!(log.recent().len(), 1);
    }

    #[test]
    fn test_entry_format() {
        let log = DiagnosticLog::new();
        log.warn("careful");
        let dump = log.recent()[0].to_string();
        assert!(dump.starts_with("[WARN "));
        assert!(dump.ends_with("careful"));
    }

    #[test]
    fn test_concurrent_append() {
        let log = DiagnosticLog::with_capacity(100);
        let mut handles = Vec::new();
        for t in 0..4 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..10 {
                    log.info(format!("t{} m{}", t, i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.recent().len(), 40);
    }
}
