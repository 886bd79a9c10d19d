//! Error types for backup schedule operations.

use thiserror::Error;

/// A user-supplied schedule value that is outside its allowed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {field} (expected {expected})")]
pub struct ValidationError {
    /// Name of the offending field (`weekly`, `daily`, `rotation`)
    pub field: &'static str,
    /// The rejected input, as given
    pub value: String,
    /// Human-readable description of what is allowed
    pub expected: String,
}

/// Error type for everything between the CLI and the compute API.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Resolution(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{}", transport_message(.status, .detail))]
    Transport { status: Option<u16>, detail: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ScheduleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScheduleError::NotFound(_))
    }
}

fn transport_message(status: &Option<u16>, detail: &str) -> String {
    match status {
        Some(code) => format!("compute API returned HTTP {}: {}", code, detail),
        None => format!("request to compute API failed: {}", detail),
    }
}
