use serde::{Deserialize, Serialize};

/// Category assigned to a single link check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkCategory {
    Ok,
    Redirect,
    Broken,
    Error,
    Unknown,
}

impl LinkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkCategory::Ok => "ok",
            LinkCategory::Redirect => "redirect",
            LinkCategory::Broken => "broken",
            LinkCategory::Error => "error",
            LinkCategory::Unknown => "unknown",
        }
    }

    /// Broken responses and transport errors.
    pub fn is_failure(&self) -> bool {
        matches!(self, LinkCategory::Broken | LinkCategory::Error)
    }
}

/// What a probe observed: either a response line or no response at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Response {
        status: u16,
        location: Option<String>,
    },
    Transport(String),
}

pub fn classify_status(status: u16) -> LinkCategory {
    match status {
        200..=299 => LinkCategory::Ok,
        300..=399 => LinkCategory::Redirect,
        400.. => LinkCategory::Broken,
        _ => LinkCategory::Unknown,
    }
}

pub fn classify(outcome: &ProbeOutcome) -> LinkCategory {
    match outcome {
        ProbeOutcome::Response { status, .. } => classify_status(*status),
        ProbeOutcome::Transport(_) => LinkCategory::Error,
    }
}
