//! Registration of remotely listed parents in the local store.

use crate::error::{SyncError, SyncResult};
use crate::model::{Parent, ParentId, RemoteParent};
use taskmirror_store::DocumentStore;
use tracing::{debug, info};

/// Result of registering a parent listing.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// Every locally stored parent after registration, sorted by id.
    ///
    /// Includes parents the listing no longer names.
    pub parents: Vec<Parent>,
    /// Parents that had no local record before this registration.
    pub created: Vec<ParentId>,
}

/// Ensures every remote parent has a local record.
///
/// Existing records are left untouched: a parent keeps the name it was first
/// registered with and its watermark.
pub struct ParentRegistrar<'a, P> {
    parents: &'a P,
    verbose: bool,
}

impl<'a, P: DocumentStore<Parent>> ParentRegistrar<'a, P> {
    /// Creates a registrar writing to `parents`.
    pub fn new(parents: &'a P) -> Self {
        Self {
            parents,
            verbose: false,
        }
    }

    /// Logs each newly added parent at info level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Registers `listed` parents.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Registration`] for the first parent that could
    /// not be read or created. Parents registered before it stay registered.
    /// Returns [`SyncError::Store`] if the local set cannot be read back.
    pub async fn register(&self, listed: &[RemoteParent]) -> SyncResult<Registration> {
        let mut created = Vec::new();

        for remote in listed {
            let key = remote.id.key();
            match self.parents.get(&key).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    self.parents
                        .put(Parent::registered(remote))
                        .await
                        .map_err(|source| SyncError::Registration {
                            parent_id: remote.id,
                            source,
                        })?;
                    if self.verbose {
                        info!(parent = %remote.id, name = %remote.name, "adding new parent");
                    } else {
                        debug!(parent = %remote.id, name = %remote.name, "adding new parent");
                    }
                    created.push(remote.id);
                }
                Err(source) => {
                    return Err(SyncError::Registration {
                        parent_id: remote.id,
                        source,
                    })
                }
            }
        }

        let mut parents = self.parents.list_all().await?;
        parents.sort_by_key(|p| p.id);
        info!(
            listed = listed.len(),
            created = created.len(),
            local = parents.len(),
            "parent registration complete"
        );
        Ok(Registration { parents, created })
    }
}
