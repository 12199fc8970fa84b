//! In-memory record set shared by the store implementations.

use crate::error::{StoreError, StoreResult};
use crate::record::{content_digest, DocKey, Record, Revision};
use crate::store::WriteOutcome;
use std::collections::BTreeMap;

/// Records of one store, keyed and revision-checked.
///
/// Every stored record carries a revision. Stores wrap this type with their
/// own locking and persistence.
#[derive(Debug, Clone)]
pub(crate) struct Collection<R> {
    docs: BTreeMap<DocKey, R>,
}

impl<R: Record> Collection<R> {
    pub(crate) fn new() -> Self {
        Self {
            docs: BTreeMap::new(),
        }
    }

    /// Rebuilds a collection from previously committed records.
    pub(crate) fn from_committed(records: Vec<R>) -> StoreResult<Self> {
        let mut docs = BTreeMap::new();
        for record in records {
            let key = record.key();
            if record.revision().is_none() {
                return Err(StoreError::Corrupted(format!(
                    "record {key} has no revision"
                )));
            }
            if docs.insert(key.clone(), record).is_some() {
                return Err(StoreError::Corrupted(format!("duplicate record {key}")));
            }
        }
        Ok(Self { docs })
    }

    pub(crate) fn get(&self, key: &DocKey) -> StoreResult<R> {
        self.docs
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key.clone()))
    }

    /// Applies one write. Returns the committed record and whether anything
    /// changed.
    pub(crate) fn put(&mut self, mut record: R) -> StoreResult<(R, bool)> {
        let key = record.key();
        let stored = self.docs.get(&key).and_then(|doc| doc.revision().cloned());

        if record.revision() != stored.as_ref() {
            return Err(StoreError::RevisionConflict {
                key,
                stored,
                supplied: record.revision().cloned(),
            });
        }

        let digest = content_digest(&record)?;
        if let Some(current) = &stored {
            if current.digest() == digest {
                return Ok((record, false));
            }
        }

        let generation = stored.map_or(1, |rev| rev.generation() + 1);
        record.set_revision(Some(Revision::new(generation, &digest)));
        self.docs.insert(key, record.clone());
        Ok((record, true))
    }

    /// Applies writes one by one. Returns the outcomes and whether anything
    /// changed.
    pub(crate) fn bulk_upsert(&mut self, records: Vec<R>) -> (Vec<WriteOutcome>, bool) {
        let mut changed = false;
        let outcomes = records
            .into_iter()
            .map(|record| {
                let key = record.key();
                let result = self.put(record).and_then(|(committed, written)| {
                    changed |= written;
                    committed.revision().cloned().ok_or_else(|| {
                        StoreError::Corrupted(format!("committed record {key} has no revision"))
                    })
                });
                WriteOutcome { key, result }
            })
            .collect();
        (outcomes, changed)
    }

    pub(crate) fn list_all(&self) -> Vec<R> {
        self.docs.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::Note;

    #[test]
    fn insert_assigns_first_generation() {
        let mut docs = Collection::new();
        let (committed, written) = docs.put(Note::new(1, "abc")).unwrap();
        assert!(written);
        assert_eq!(committed.rev.as_ref().unwrap().generation(), 1);
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn insert_with_revision_conflicts() {
        let mut docs = Collection::new();
        let mut note = Note::new(1, "abc");
        note.rev = Some(Revision::new(1, "feed"));
        let err = docs.put(note).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(docs.len(), 0);
    }

    #[test]
    fn update_requires_current_revision() {
        let mut docs = Collection::new();
        let (first, _) = docs.put(Note::new(1, "abc")).unwrap();

        // Missing revision on an existing record
        assert!(docs.put(Note::new(1, "efg")).unwrap_err().is_conflict());

        let mut update = first.clone();
        update.body = "efg".into();
        let (second, written) = docs.put(update).unwrap();
        assert!(written);
        assert_eq!(second.rev.as_ref().unwrap().generation(), 2);

        // The first revision is now stale
        let mut stale = first;
        stale.body = "xyz".into();
        assert!(docs.put(stale).unwrap_err().is_conflict());
        assert_eq!(docs.get(&DocKey::from_numeric(1)).unwrap().body, "efg");
    }

    #[test]
    fn unchanged_content_keeps_revision() {
        let mut docs = Collection::new();
        let (first, _) = docs.put(Note::new(1, "abc")).unwrap();
        let (again, written) = docs.put(first.clone()).unwrap();
        assert!(!written);
        assert_eq!(again.rev, first.rev);
    }

    #[test]
    fn bulk_reports_each_record() {
        let mut docs = Collection::new();
        docs.put(Note::new(2, "existing")).unwrap();

        let (outcomes, changed) = docs.bulk_upsert(vec![
            Note::new(1, "new"),
            Note::new(2, "missing revision"),
            Note::new(3, "also new"),
        ]);
        assert!(changed);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
        assert!(outcomes[2].is_ok());
        assert_eq!(outcomes[1].key, DocKey::from_numeric(2));
        assert_eq!(docs.len(), 3);
    }

    #[test]
    fn from_committed_rejects_bad_input() {
        let unrevisioned = vec![Note::new(1, "abc")];
        assert!(matches!(
            Collection::from_committed(unrevisioned),
            Err(StoreError::Corrupted(_))
        ));

        let mut a = Note::new(1, "abc");
        a.rev = Some(Revision::new(1, "aa"));
        let dup = vec![a.clone(), a];
        assert!(matches!(
            Collection::from_committed(dup),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn list_is_key_ordered() {
        let mut docs = Collection::new();
        for id in [9, 10, 1] {
            docs.put(Note::new(id, "x")).unwrap();
        }
        let keys: Vec<_> = docs.list_all().into_iter().map(|n| n.id).collect();
        // String key order, not numeric
        assert_eq!(keys, vec![1, 10, 9]);
    }
}
