//! Unified error type for all command handlers.
//!
//! `AppError` is the single error type returned by every engine operation and
//! command handler. It serializes as `{ "kind": "...", "message": "..." }` so
//! the agent can programmatically distinguish error categories inside an
//! error acknowledgement.

use serde::ser::SerializeStruct;

/// Application-level error returned by all engine operations.
///
/// Each variant maps to a distinct failure domain. The agent receives a JSON
/// object with `kind` (variant name) and `message` (human-readable description).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed domain or command; rejected before any state is touched.
    #[error("{0}")]
    InvalidInput(String),

    /// A rule-backend call failed or timed out; state keeps its prior value.
    #[error("{0}")]
    Platform(String),

    /// A persistence read/write failed.
    #[error("{0}")]
    Store(String),

    /// I/O and OS-level errors (socket, filesystem).
    #[error("{0}")]
    Io(String),
}

impl AppError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Platform(_) => "Platform",
            AppError::Store(_) => "Store",
            AppError::Io(_) => "Io",
        }
    }
}

/// Custom Serialize: produces `{ "kind": "Variant", "message": "..." }` for acks.
impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
