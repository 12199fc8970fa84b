//! In-memory index of locally known parents.

use crate::error::SyncResult;
use crate::model::{Parent, ParentId};
use std::collections::HashMap;
use taskmirror_store::DocumentStore;

/// A point-in-time view of every stored parent.
///
/// The index is owned by the caller and is never refreshed behind its back;
/// call [`load_index`] again to pick up later changes.
#[derive(Debug, Clone, Default)]
pub struct ParentIndex {
    parents: Vec<Parent>,
    by_id: HashMap<ParentId, usize>,
}

impl ParentIndex {
    /// Builds an index from parent records, ordered by id.
    pub fn new(mut parents: Vec<Parent>) -> Self {
        parents.sort_by_key(|p| p.id);
        parents.dedup_by_key(|p| p.id);
        let by_id = parents
            .iter()
            .enumerate()
            .map(|(position, p)| (p.id, position))
            .collect();
        Self { parents, by_id }
    }

    /// Looks up a parent by id.
    pub fn get(&self, id: ParentId) -> Option<&Parent> {
        self.by_id.get(&id).map(|&position| &self.parents[position])
    }

    /// Returns every parent, ordered by id.
    pub fn parents(&self) -> &[Parent] {
        &self.parents
    }

    /// Iterates over parents in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Parent> {
        self.parents.iter()
    }

    /// Number of parents.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns true if no parent is known.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Parents that have not completed a sync yet.
    pub fn never_synced(&self) -> impl Iterator<Item = &Parent> {
        self.parents.iter().filter(|p| p.last_updated.is_none())
    }
}

impl<'a> IntoIterator for &'a ParentIndex {
    type Item = &'a Parent;
    type IntoIter = std::slice::Iter<'a, Parent>;

    fn into_iter(self) -> Self::IntoIter {
        self.parents.iter()
    }
}

/// Reads every parent record from `store` into a [`ParentIndex`].
///
/// # Errors
///
/// Returns [`crate::SyncError::Store`] if the store cannot be read.
pub async fn load_index<P: DocumentStore<Parent>>(store: &P) -> SyncResult<ParentIndex> {
    let parents = store.list_all().await?;
    Ok(ParentIndex::new(parents))
}
