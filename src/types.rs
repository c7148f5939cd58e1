use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::{classify_outcome, Classification, StatusPolicy};

/// Why a probe produced no status code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    Timeout,
    Network(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Timeout => f.write_str("request timed out"),
            ProbeFailure::Network(msg) => f.write_str(msg),
        }
    }
}

/// Terminal state of a single probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Completed(u16),
    Failed(ProbeFailure),
    Cancelled,
}

impl ProbeStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            ProbeStatus::Completed(code) => Some(*code),
            _ => None,
        }
    }
}

/// One probed candidate and what came back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub candidate: String,
    pub url: String,
    pub status: ProbeStatus,
    pub classification: Classification,
    pub timestamp: String,
}

impl ProbeOutcome {
    pub fn new(candidate: String, url: String, status: ProbeStatus, policy: &StatusPolicy) -> Self {
        let classification = classify_outcome(&status, policy);
        Self {
            candidate,
            url,
            status,
            classification,
            timestamp: crate::now_rfc3339(),
        }
    }

    pub fn is_reportable(&self) -> bool {
        self.classification.is_reportable()
    }

    /// The persisted form: `admin - Status: 200`.
    pub fn line(&self) -> String {
        match &self.status {
            ProbeStatus::Completed(code) => format!("{} - Status: {}", self.candidate, code),
            ProbeStatus::Failed(why) => format!("{} - Error: {}", self.candidate, why),
            ProbeStatus::Cancelled => format!("{} - Cancelled", self.candidate),
        }
    }
}

/// Everything a finished (or interrupted) run hands back to the caller.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RunResult {
    pub total: u64,
    pub processed: u64,
    pub reported: u64,
    pub elapsed_ms: u64,
    pub cancelled: bool,
    pub entries: Vec<ProbeOutcome>,
}

impl RunResult {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ProbeOutcome::line).collect()
    }
}

/// `HH:MM:SS.mmm`, hours are not wrapped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let ms = total_ms % 1_000;
    let secs = (total_ms / 1_000) % 60;
    let mins = (total_ms / 60_000) % 60;
    let hours = total_ms / 3_600_000;
    format!("{hours:02}:{mins:02}:{secs:02}.{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_matches_output_file() {
        let o = ProbeOutcome::new(
            "admin".into(),
            "http://h/admin".into(),
            ProbeStatus::Completed(200),
            &StatusPolicy::default(),
        );
        assert_eq!(o.line(), "admin - Status: 200");
        assert_eq!(o.classification, Classification::Highlight);
    }

    #[test]
    fn failed_and_cancelled_are_never_reportable() {
        let p = StatusPolicy::default();
        let failed = ProbeOutcome::new(
            "a".into(),
            "u".into(),
            ProbeStatus::Failed(ProbeFailure::Timeout),
            &p,
        );
        let cancelled = ProbeOutcome::new("b".into(), "u".into(), ProbeStatus::Cancelled, &p);
        assert!(!failed.is_reportable());
        assert!(!cancelled.is_reportable());
        assert_eq!(failed.status.code(), None);
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_millis(0)), "00:00:00.000");
        assert_eq!(format_elapsed(Duration::from_millis(3_723_045)), "01:02:03.045");
    }
}
