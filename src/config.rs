use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::classify::StatusPolicy;
use crate::error::FuzzError;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// How results are persisted when an output path is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One `candidate - Status: code` line per hit.
    #[default]
    Lines,
    Json,
}

/// Settings for one fuzzing run. Built once by the caller, read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub wordlist: PathBuf,
    pub concurrency: usize,
    pub extensions: Vec<String>,
    pub timeout: Duration,
    pub verbose: bool,
    pub output: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub user_agent: String,
    pub status_policy: StatusPolicy,
    pub show_progress: bool,
}

impl Config {
    pub fn new(url: impl Into<String>, wordlist: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            wordlist: wordlist.into(),
            concurrency: DEFAULT_CONCURRENCY,
            extensions: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
            output: None,
            output_format: OutputFormat::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            status_policy: StatusPolicy::default(),
            show_progress: true,
        }
    }

    /// Check the invariants the engine relies on. Does not touch the wordlist file.
    pub fn validate(&self) -> Result<(), FuzzError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(FuzzError::MissingUrl);
        }
        let parsed = Url::parse(url).map_err(|e| FuzzError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FuzzError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if self.wordlist.as_os_str().is_empty() {
            return Err(FuzzError::MissingWordlist(self.wordlist.clone()));
        }
        if self.concurrency == 0 {
            return Err(FuzzError::InvalidConcurrency(self.concurrency));
        }
        if self.timeout.is_zero() {
            return Err(FuzzError::InvalidTimeout);
        }
        Ok(())
    }

    /// Base URL without trailing slashes; candidates are joined with a single `/`.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    pub fn candidate_url(&self, candidate: &str) -> String {
        format!("{}/{}", self.base_url(), candidate)
    }
}
