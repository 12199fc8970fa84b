//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use crate::model::ScopeId;
use std::time::Duration;

/// Remote fields requested for every item unless overridden.
pub const DEFAULT_FIELDS: &[&str] = &[
    "completed",
    "completed_at",
    "created_at",
    "due_on",
    "assignee_status",
    "modified_at",
    "parent",
    "notes",
    "name",
];

/// Largest page the remote listing accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Configuration for refresh runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote scope mirrored by this engine.
    pub scope: ScopeId,
    /// Item fields requested from the remote.
    pub fields: Vec<String>,
    /// Items requested per page.
    pub page_size: u32,
    /// Log per-page progress at info level.
    pub verbose: bool,
    /// Deadline for a single page request.
    pub page_timeout: Duration,
    /// Deadline for fetching all pages of one parent.
    pub parent_timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration for a scope with default settings.
    pub fn new(scope: u64) -> Self {
        Self {
            scope: ScopeId(scope),
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            page_size: MAX_PAGE_SIZE,
            verbose: false,
            page_timeout: Duration::from_secs(30),
            parent_timeout: Duration::from_secs(300),
        }
    }

    /// Sets the requested item fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Enables or disables verbose progress logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the per-page deadline.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Sets the per-parent deadline.
    pub fn with_parent_timeout(mut self, timeout: Duration) -> Self {
        self.parent_timeout = timeout;
        self
    }

    /// Returns the field list in the comma-separated form remotes expect.
    pub fn field_selection(&self) -> String {
        self.fields.join(",")
    }

    /// Checks that the configuration can drive a refresh.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> SyncResult<()> {
        if self.scope.0 == 0 {
            return Err(SyncError::InvalidConfig("scope is required".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::InvalidConfig(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.fields.is_empty() {
            return Err(SyncError::InvalidConfig("field selection is empty".into()));
        }
        if let Some(bad) = self
            .fields
            .iter()
            .find(|f| f.trim().is_empty() || f.contains(','))
        {
            return Err(SyncError::InvalidConfig(format!(
                "invalid field name {bad:?}"
            )));
        }
        if self.page_timeout.is_zero() || self.parent_timeout.is_zero() {
            return Err(SyncError::InvalidConfig("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}
