use std::path::PathBuf;

use thiserror::Error;

/// Run-fatal errors. All of them are raised before the first request is sent.
#[derive(Debug, Error)]
pub enum FuzzError {
    #[error("missing target URL")]
    MissingUrl,

    #[error("invalid target URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("missing dictionary: {0} does not exist")]
    MissingWordlist(PathBuf),

    #[error("failed to read dictionary {path}")]
    UnreadableWordlist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(usize),

    #[error("request timeout must be greater than zero")]
    InvalidTimeout,
}

impl FuzzError {
    /// True for errors caused by bad user input, which warrant printing usage.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, FuzzError::UnreadableWordlist { .. })
    }
}
