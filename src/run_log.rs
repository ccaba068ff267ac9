// ==============================================================================
// run_log.rs - Per-Run Event Log
// ==============================================================================
// Description: Notices raised while assembling one report (skipped files,
//              overridden counts, missing sources)
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// One event recorded during a report run
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notice {
    pub timestamp: DateTime<Utc>,
    pub severity: LogSeverity,
    /// Data source that raised the notice (e.g. "vcf", "flagstat")
    pub source: String,
    pub sample: Option<String>,
    pub message: String,
}

/// Event log scoped to a single report-generation call
///
/// Every notice is forwarded to `tracing` as it is recorded, so the log
/// doubles as the run's structured console output. Collectors running on
/// separate tasks get their own `RunLog`, folded back with [`RunLog::extend`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunLog {
    notices: Vec<Notice>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&mut self, source: &str, sample: Option<&str>, message: impl Into<String>) {
        self.record(LogSeverity::Debug, source, sample, message.into());
    }

    pub fn info(&mut self, source: &str, sample: Option<&str>, message: impl Into<String>) {
        self.record(LogSeverity::Info, source, sample, message.into());
    }

    pub fn warn(&mut self, source: &str, sample: Option<&str>, message: impl Into<String>) {
        self.record(LogSeverity::Warning, source, sample, message.into());
    }

    pub fn error(&mut self, source: &str, sample: Option<&str>, message: impl Into<String>) {
        self.record(LogSeverity::Error, source, sample, message.into());
    }

    fn record(&mut self, severity: LogSeverity, source: &str, sample: Option<&str>, message: String) {
        let sample_label = sample.unwrap_or("-");
        match severity {
            LogSeverity::Debug => debug!(source = source, sample = sample_label, "{}", message),
            LogSeverity::Info => info!(source = source, sample = sample_label, "{}", message),
            LogSeverity::Warning => warn!(source = source, sample = sample_label, "{}", message),
            LogSeverity::Error => error!(source = source, sample = sample_label, "{}", message),
        }

        self.notices.push(Notice {
            timestamp: Utc::now(),
            severity,
            source: source.to_string(),
            sample: sample.map(str::to_string),
            message,
        });
    }

    /// Fold another run log into this one, keeping insertion order
    pub fn extend(&mut self, other: RunLog) {
        self.notices.extend(other.notices);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Notices at or above `severity`
    pub fn at_least(&self, severity: LogSeverity) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.severity >= severity)
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
