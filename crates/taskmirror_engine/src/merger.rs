//! Carries stored revisions onto freshly fetched items.

use crate::model::{ChildItem, ItemId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use taskmirror_store::{Record, Revision};

/// Revisions of every locally stored item, captured before a run writes.
#[derive(Debug, Clone, Default)]
pub struct PriorSnapshot {
    revisions: HashMap<ItemId, Revision>,
}

impl PriorSnapshot {
    /// Indexes stored items by id. Items without a revision are skipped.
    pub fn from_items(items: impl IntoIterator<Item = ChildItem>) -> Self {
        let revisions = items
            .into_iter()
            .filter_map(|item| item.storage_revision.map(|rev| (item.id, rev)))
            .collect();
        Self { revisions }
    }

    /// Returns the stored revision of `id`.
    pub fn revision_of(&self, id: ItemId) -> Option<&Revision> {
        self.revisions.get(&id)
    }

    /// Returns true if `id` is stored locally.
    pub fn contains(&self, id: ItemId) -> bool {
        self.revisions.contains_key(&id)
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}

/// A commit-ready batch.
#[derive(Debug, Clone, Default)]
pub struct MergedBatch {
    /// Items in first-arrival order, each with its prior revision.
    pub items: Vec<ChildItem>,
    /// Items with no local record.
    pub inserts: usize,
    /// Items replacing a local record.
    pub updates: usize,
    /// Repeated arrivals folded into an earlier item.
    pub duplicates: usize,
}

/// Prepares `fresh` items for a bulk commit against `prior`.
///
/// Known ids carry the prior revision; unknown ids carry none. An id that
/// arrives more than once keeps the position of its first arrival and the
/// content of its last.
pub fn merge_revisions(fresh: Vec<ChildItem>, prior: &PriorSnapshot) -> MergedBatch {
    let mut batch = MergedBatch::default();
    let mut positions: HashMap<ItemId, usize> = HashMap::with_capacity(fresh.len());

    for mut item in fresh {
        let known = prior.contains(item.id);
        item.set_revision(prior.revision_of(item.id).cloned());
        match positions.entry(item.id) {
            Entry::Occupied(slot) => {
                batch.items[*slot.get()] = item;
                batch.duplicates += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(batch.items.len());
                if known {
                    batch.updates += 1;
                } else {
                    batch.inserts += 1;
                }
                batch.items.push(item);
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParentId;
    use serde_json::{json, Map, Value};

    fn item(id: u64, name: &str) -> ChildItem {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(name.into()));
        ChildItem::new(ItemId(id), ParentId(1), fields)
    }

    fn stored(id: u64, generation: u64) -> ChildItem {
        let mut item = item(id, "old");
        item.storage_revision = Some(Revision::new(generation, "00ff"));
        item
    }

    #[test]
    fn known_ids_carry_prior_revision() {
        let prior = PriorSnapshot::from_items(vec![stored(1, 3)]);
        let batch = merge_revisions(vec![item(1, "efg"), item(2, "new")], &prior);

        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.items[0].storage_revision, Some(Revision::new(3, "00ff")));
        assert_eq!(batch.items[0].field("name"), Some(&json!("efg")));
        assert!(batch.items[1].storage_revision.is_none());
        assert_eq!((batch.inserts, batch.updates, batch.duplicates), (1, 1, 0));
    }

    #[test]
    fn fresh_revisions_are_replaced() {
        let mut incoming = item(5, "x");
        incoming.storage_revision = Some(Revision::new(99, "beef"));
        let batch = merge_revisions(vec![incoming], &PriorSnapshot::default());
        assert!(batch.items[0].storage_revision.is_none());
    }

    #[test]
    fn duplicates_collapse() {
        let batch = merge_revisions(
            vec![item(1, "a"), item(2, "b"), item(1, "c")],
            &PriorSnapshot::default(),
        );
        let names: Vec<_> = batch
            .items
            .iter()
            .map(|i| (i.id.0, i.field("name").cloned()))
            .collect();
        assert_eq!(names, vec![(1, Some(json!("c"))), (2, Some(json!("b")))]);
        assert_eq!((batch.inserts, batch.duplicates), (2, 1));
    }

    #[test]
    fn empty_batch() {
        let prior = PriorSnapshot::from_items(vec![stored(1, 1)]);
        let batch = merge_revisions(Vec::new(), &prior);
        assert!(batch.items.is_empty());
        assert_eq!(prior.len(), 1);
        assert!(prior.contains(ItemId(1)));
        assert!(!prior.is_empty());
    }

    #[test]
    fn snapshot_skips_unrevisioned() {
        let prior = PriorSnapshot::from_items(vec![item(1, "never stored"), stored(2, 1)]);
        assert!(!prior.contains(ItemId(1)));
        assert!(prior.contains(ItemId(2)));
    }
}
