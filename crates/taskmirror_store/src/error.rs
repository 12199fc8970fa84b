//! Error types for document store operations.

use crate::record::{DocKey, Revision};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No record exists under the key.
    #[error("document not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: DocKey,
    },

    /// The supplied revision does not match the stored one.
    #[error("revision conflict on {key}: stored {stored:?}, supplied {supplied:?}")]
    RevisionConflict {
        /// The key of the conflicting record.
        key: DocKey,
        /// Revision currently stored, if the record exists.
        stored: Option<Revision>,
        /// Revision supplied by the writer.
        supplied: Option<Revision>,
    },

    /// The persisted store contents are invalid.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Creates a not-found error for a key.
    pub fn not_found(key: DocKey) -> Self {
        Self::NotFound { key }
    }

    /// Returns true if the record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Returns true if the write was rejected for a stale revision.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::RevisionConflict { .. })
    }
}
