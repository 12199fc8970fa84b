//! Error types for the sync engine.

use crate::model::ParentId;
use std::time::Duration;
use taskmirror_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for remote fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised while listing or paginating the remote source.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The remote call was rejected or failed in transport.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the request could succeed if repeated.
        retryable: bool,
    },

    /// A page arrived without the data or metadata it must carry.
    #[error("malformed page {page}: {reason}")]
    MalformedPage {
        /// 1-based page number within the walk.
        page: u32,
        /// What was wrong with the page.
        reason: String,
    },

    /// A single page request exceeded its deadline.
    #[error("page {page} timed out after {after:?}")]
    Timeout {
        /// 1-based page number within the walk.
        page: u32,
        /// The deadline that expired.
        after: Duration,
    },

    /// The whole walk for one parent exceeded its deadline.
    #[error("fetch exceeded deadline of {0:?}")]
    Deadline(Duration),
}

impl FetchError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a malformed-page error.
    pub fn malformed(page: u32, reason: impl Into<String>) -> Self {
        Self::MalformedPage {
            page,
            reason: reason.into(),
        }
    }

    /// Returns true if a later run could succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Remote { retryable, .. } => *retryable,
            FetchError::Timeout { .. } | FetchError::Deadline(_) => true,
            FetchError::MalformedPage { .. } => false,
        }
    }
}

/// Errors that can occur during a refresh.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Listing parents or paginating a parent's items failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A parent could not be checked or created locally.
    #[error("registration of parent {parent_id} failed: {source}")]
    Registration {
        /// The parent being registered.
        parent_id: ParentId,
        /// The underlying store error.
        source: StoreError,
    },

    /// The bulk write of a parent's items did not fully succeed.
    #[error("commit for parent {parent_id} rejected {rejected} of {total} items: {reason}")]
    Commit {
        /// The parent whose items were committed.
        parent_id: ParentId,
        /// Number of items the store did not accept.
        rejected: usize,
        /// Number of items in the batch.
        total: usize,
        /// First rejection reason reported by the store.
        reason: String,
    },

    /// The parent record kept changing underneath the watermark update.
    #[error("watermark for parent {parent_id} still conflicting after {attempts} attempts")]
    WatermarkConflict {
        /// The parent whose watermark could not be written.
        parent_id: ParentId,
        /// Number of read-modify-write attempts made.
        attempts: u32,
    },

    /// Store error outside of registration and commit.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A refresh is already in progress on this engine.
    #[error("a refresh is already running on this engine")]
    AlreadyRunning,
}

impl SyncError {
    /// Returns the parent this error belongs to, if any.
    pub fn parent_id(&self) -> Option<ParentId> {
        match self {
            SyncError::Registration { parent_id, .. }
            | SyncError::Commit { parent_id, .. }
            | SyncError::WatermarkConflict { parent_id, .. } => Some(*parent_id),
            _ => None,
        }
    }

    /// Returns true if a later run could succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Fetch(e) => e.is_retryable(),
            SyncError::Commit { .. } | SyncError::WatermarkConflict { .. } => true,
            SyncError::AlreadyRunning => true,
            _ => false,
        }
    }
}
