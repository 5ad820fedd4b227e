//! Structural error types.
//!
//! Only inputs that cannot be interpreted at all surface as errors. Verification
//! findings (schema violations, missing or drifted files) are data in a
//! [`crate::types::ReplayReport`] and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for snapshot, receipt and replay operations.
pub type BluxResult<T> = Result<T, BluxError>;

/// Errors raised to the caller immediately.
#[derive(Debug, Error)]
pub enum BluxError {
    /// A mandatory read or write failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be parsed as JSON.
    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record is outside the accepted shapes (non-object, missing or mistyped field).
    #[error("malformed {collection} record: {reason}")]
    MalformedRecord {
        collection: &'static str,
        reason: String,
    },

    /// Canonical encoding failed.
    #[error("canonical encoding failed: {0}")]
    Canonical(String),

    /// An embedded schema failed to load or compile.
    #[error("schema error: {0}")]
    Schema(String),
}

impl BluxError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(collection: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            collection,
            reason: reason.into(),
        }
    }

    /// Returns true if this error comes from a record outside the accepted shapes.
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}
