//! Document store trait definition.

use crate::error::StoreResult;
use crate::record::{DocKey, Record, Revision};
use std::future::Future;

/// Outcome of one record inside a bulk upsert.
#[derive(Debug)]
pub struct WriteOutcome {
    /// Key of the record.
    pub key: DocKey,
    /// Committed revision, or the reason the record was rejected.
    pub result: StoreResult<Revision>,
}

impl WriteOutcome {
    /// Returns true if the record was committed.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// A revisioned document store holding records of one kind.
///
/// # Invariants
///
/// - `put` of a new record must carry no revision
/// - `put` of an existing record must carry the stored revision
/// - `put` returns the record as committed, with its new revision
/// - `bulk_upsert` applies the same rules record by record and reports
///   one [`WriteOutcome`] per input, in input order
/// - `list_all` returns records in key order
/// - Once a write future resolves `Ok`, the write is durable for that store
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - For testing
/// - [`crate::FileStore`] - For persistent storage
pub trait DocumentStore<R: Record>: Send + Sync {
    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if no record exists, or
    /// another error if the store cannot be read.
    fn get(&self, key: &DocKey) -> impl Future<Output = StoreResult<R>> + Send;

    /// Inserts or updates a single record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::RevisionConflict`] if the record's
    /// revision does not match the stored one.
    fn put(&self, record: R) -> impl Future<Output = StoreResult<R>> + Send;

    /// Inserts or updates many records, reporting per-record outcomes.
    ///
    /// # Errors
    ///
    /// Returns an error only if the batch as a whole could not be applied
    /// (for example the store could not be persisted). Rejected records are
    /// reported through their [`WriteOutcome`].
    fn bulk_upsert(
        &self,
        records: Vec<R>,
    ) -> impl Future<Output = StoreResult<Vec<WriteOutcome>>> + Send;

    /// Returns every record in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_all(&self) -> impl Future<Output = StoreResult<Vec<R>>> + Send;
}
