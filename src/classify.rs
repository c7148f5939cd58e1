use serde::{Deserialize, Serialize};

use crate::types::ProbeStatus;

/// How interesting a probe result is.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Ignore,
    Report,
    Highlight,
}

impl Classification {
    pub fn is_reportable(self) -> bool {
        !matches!(self, Classification::Ignore)
    }
}

/// Which status codes count as hits.
///
/// `AnyExcept404` is the default. `Only` keeps the older whitelist behaviour,
/// see [`StatusPolicy::legacy`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    #[default]
    AnyExcept404,
    Only(Vec<u16>),
}

impl StatusPolicy {
    pub fn legacy() -> Self {
        StatusPolicy::Only(vec![200, 204, 301, 302, 307, 401])
    }

    fn accepts(&self, code: u16) -> bool {
        if code == 404 {
            return false;
        }
        match self {
            StatusPolicy::AnyExcept404 => true,
            StatusPolicy::Only(codes) => codes.contains(&code),
        }
    }
}

/// Coarse status family, used for terminal colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Redirect,
    Other,
}

impl StatusKind {
    pub fn of(code: u16) -> Self {
        match code {
            200..=299 => StatusKind::Success,
            300..=399 => StatusKind::Redirect,
            _ => StatusKind::Other,
        }
    }
}

pub fn classify_status(code: u16, policy: &StatusPolicy) -> Classification {
    if !policy.accepts(code) {
        return Classification::Ignore;
    }
    match StatusKind::of(code) {
        StatusKind::Success => Classification::Highlight,
        _ => Classification::Report,
    }
}

pub fn classify_outcome(status: &ProbeStatus, policy: &StatusPolicy) -> Classification {
    match status {
        ProbeStatus::Completed(code) => classify_status(*code, policy),
        ProbeStatus::Failed(_) | ProbeStatus::Cancelled => Classification::Ignore,
    }
}
