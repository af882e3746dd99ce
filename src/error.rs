use std::fmt;

use thiserror::Error;

/// Slots that keep a form from being submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingParts {
    pub missing_assets: Vec<usize>,
    pub missing_positions: Vec<usize>,
    /// Positions outside 1..=N.
    pub invalid_positions: Vec<usize>,
    pub conflicts: Vec<usize>,
}

impl MissingParts {
    pub fn is_empty(&self) -> bool {
        self.missing_assets.is_empty()
            && self.missing_positions.is_empty()
            && self.invalid_positions.is_empty()
            && self.conflicts.is_empty()
    }
}

impl fmt::Display for MissingParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing_assets.is_empty() {
            parts.push(format!("no image in slots {}", ordinals(&self.missing_assets)));
        }
        if !self.missing_positions.is_empty() {
            parts.push(format!(
                "no position in slots {}",
                ordinals(&self.missing_positions)
            ));
        }
        if !self.invalid_positions.is_empty() {
            parts.push(format!(
                "position out of range in slots {}",
                ordinals(&self.invalid_positions)
            ));
        }
        if !self.conflicts.is_empty() {
            parts.push(format!(
                "duplicate positions in slots {}",
                ordinals(&self.conflicts)
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}

// Users count slots from 1.
fn ordinals(slots: &[usize]) -> String {
    slots
        .iter()
        .map(|i| (i + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Slot {index} is out of range (form has {len} slots)")]
    OutOfRange { index: usize, len: usize },

    #[error("Position {value} is not in 1..={max}")]
    InvalidPosition { value: u32, max: u32 },

    #[error("Please complete the form before building: {0}")]
    IncompleteForm(MissingParts),

    #[error("Target URL is not valid: {0}")]
    InvalidTargetUrl(String),
}

impl FormError {
    /// Slot indices come from UI wiring, so a bad one is a programming error.
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        log::error!("slot {} out of range for {} slots", index, len);
        FormError::OutOfRange { index, len }
    }
}

/// Why a submission attempt failed. Surfaced to the user, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitFailure {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Server error ({status}){}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    ServerError { status: u16, message: Option<String> },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error("A build is already in progress")]
    InFlight,

    #[error("The form changed while the build was in flight; response discarded")]
    Superseded,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
