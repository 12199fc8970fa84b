//! File-based document store for persistent caches.

use crate::collection::Collection;
use crate::error::StoreResult;
use crate::record::{DocKey, Record};
use crate::store::{DocumentStore, WriteOutcome};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// A document store persisted as one JSON file.
///
/// The whole store lives in `<dir>/<name>.json`. Reads are served from
/// memory; every effective write produces the next state, persists it to a
/// temporary file, renames that over the live file and only then publishes
/// the new state in memory.
///
/// # Durability
///
/// - A write future resolves only after the rename completed
/// - A failed persist leaves both the file and the in-memory state unchanged
/// - Writes that change nothing (same content, same revision) skip the disk
///
/// # Example
///
/// ```rust,ignore
/// use taskmirror_store::FileStore;
///
/// let parents: FileStore<Parent> = FileStore::open(dir, "parents").await?;
/// ```
#[derive(Debug)]
pub struct FileStore<R> {
    path: PathBuf,
    docs: RwLock<Collection<R>>,
    write_lock: Mutex<()>,
}

impl<R: Record> FileStore<R> {
    /// Opens or creates the store `name` inside `dir`.
    ///
    /// The directory is created if needed. An existing file is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the file cannot
    /// be read, or its contents are not a valid committed record set.
    pub async fn open(dir: &Path, name: &str) -> StoreResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{name}.json"));

        let docs = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let records: Vec<R> = serde_json::from_slice(&bytes)?;
                Collection::from_committed(records)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collection::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), records = docs.len(), "opened file store");

        Ok(Self {
            path,
            docs: RwLock::new(docs),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
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

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Flushes the directory entry of the live file after a rename.
    #[cfg(unix)]
    async fn sync_dir(&self) -> StoreResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::File::open(dir).await?.sync_all().await?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Writes `next` to disk and syncs it before returning. Callers must hold `write_lock`.
    async fn persist(&self, next: &Collection<R>) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&next.list_all())?;
        let staging = self.staging_path();

        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&staging, &self.path).await?;
        self.sync_dir().await?;
        debug!(path = %self.path.display(), records = next.len(), "persisted file store");
        Ok(())
    }
}

impl<R: Record> DocumentStore<R> for FileStore<R> {
    async fn get(&self, key: &DocKey) -> StoreResult<R> {
        self.docs.read().get(key)
    }

    async fn put(&self, record: R) -> StoreResult<R> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.docs.read().clone();
        let (committed, written) = next.put(record)?;
        if written {
            self.persist(&next).await?;
            *self.docs.write() = next;
        }
        Ok(committed)
    }

    async fn bulk_upsert(&self, records: Vec<R>) -> StoreResult<Vec<WriteOutcome>> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.docs.read().clone();
        let (outcomes, changed) = next.bulk_upsert(records);
        if changed {
            self.persist(&next).await?;
            *self.docs.write() = next;
        }
        Ok(outcomes)
    }

    async fn list_all(&self) -> StoreResult<Vec<R>> {
        Ok(self.docs.read().list_all())
    }
}
