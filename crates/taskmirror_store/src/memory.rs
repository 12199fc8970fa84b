//! In-memory document store for testing.

use crate::collection::Collection;
use crate::error::StoreResult;
use crate::record::{DocKey, Record};
use crate::store::{DocumentStore, WriteOutcome};
use parking_lot::RwLock;

/// An in-memory document store.
///
/// This store keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Caches that don't need to outlive the process
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks. The lock is
/// never held across an await point.
#[derive(Debug)]
pub struct MemoryStore<R> {
    docs: RwLock<Collection<R>>,
}

impl<R: Record> MemoryStore<R> {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Collection::new()),
        }
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of every stored record without going through the
    /// async interface.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self) -> Vec<R> {
        self.docs.read().list_all()
    }
}

impl<R: Record> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> DocumentStore<R> for MemoryStore<R> {
    async fn get(&self, key: &DocKey) -> StoreResult<R> {
        self.docs.read().get(key)
    }

    async fn put(&self, record: R) -> StoreResult<R> {
        let (committed, _) = self.docs.write().put(record)?;
        Ok(committed)
    }

    async fn bulk_upsert(&self, records: Vec<R>) -> StoreResult<Vec<WriteOutcome>> {
        let (outcomes, _) = self.docs.write().bulk_upsert(records);
        Ok(outcomes)
    }

    async fn list_all(&self) -> StoreResult<Vec<R>> {
        Ok(self.docs.read().list_all())
    }
}
