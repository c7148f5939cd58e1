//! Library crate for dir-fuzz-rs: wordlist-driven HTTP path discovery.
pub mod aggregator;
pub mod classify;
pub mod config;
pub mod error;
pub mod progress;
pub mod scanner;
pub mod types;
pub mod wordlist;

pub use config::Config;
pub use error::FuzzError;
pub use types::{ProbeOutcome, ProbeStatus, RunResult};

use time::{format_description::well_known, OffsetDateTime};

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
