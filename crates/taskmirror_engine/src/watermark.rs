//! Per-parent sync watermarks.

use crate::error::{SyncError, SyncResult};
use crate::model::{Parent, ParentId};
use chrono::{DateTime, Utc};
use taskmirror_store::DocumentStore;
use tracing::{debug, warn};

/// Read-modify-write attempts made before giving up on a conflicting parent.
pub const WATERMARK_ATTEMPTS: u32 = 2;

/// Reads and advances the `last_updated` watermark of parent records.
pub struct WatermarkTracker<'a, P> {
    parents: &'a P,
}

impl<'a, P: DocumentStore<Parent>> WatermarkTracker<'a, P> {
    /// Creates a tracker over `parents`.
    pub fn new(parents: &'a P) -> Self {
        Self { parents }
    }

    /// Returns the stored watermark of `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the parent cannot be read.
    pub async fn current(&self, parent_id: ParentId) -> SyncResult<Option<DateTime<Utc>>> {
        let parent = self.parents.get(&parent_id.key()).await?;
        Ok(parent.last_updated)
    }

    /// Advances the watermark of `parent_id` to `window_start`.
    ///
    /// Must only be called after the parent's items were committed. The
    /// stored value never moves backwards. Returns the watermark now stored.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WatermarkConflict`] if the record changed under
    /// every attempt, or [`SyncError::Store`] for other store failures.
    pub async fn advance(
        &self,
        parent_id: ParentId,
        window_start: DateTime<Utc>,
    ) -> SyncResult<DateTime<Utc>> {
        let key = parent_id.key();

        for attempt in 1..=WATERMARK_ATTEMPTS {
            let mut parent = self.parents.get(&key).await?;
            let next = parent
                .last_updated
                .map_or(window_start, |current| current.max(window_start));
            if parent.last_updated == Some(next) {
                return Ok(next);
            }

            parent.last_updated = Some(next);
            match self.parents.put(parent).await {
                Ok(_) => {
                    debug!(parent = %parent_id, watermark = %next, "watermark advanced");
                    return Ok(next);
                }
                Err(e) if e.is_conflict() => {
                    warn!(parent = %parent_id, attempt, "watermark write conflicted");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SyncError::WatermarkConflict {
            parent_id,
            attempts: WATERMARK_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RemoteParent;
    use chrono::Duration;
    use taskmirror_store::MemoryStore;

    async fn store_with_parent() -> MemoryStore<Parent> {
        let store = MemoryStore::new();
        store
            .put(Parent::registered(&RemoteParent::new(5, "bill")))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn first_advance_sets_watermark() {
        let store = store_with_parent().await;
        let tracker = WatermarkTracker::new(&store);
        assert_eq!(tracker.current(ParentId(5)).await.unwrap(), None);

        let start = Utc::now();
        assert_eq!(tracker.advance(ParentId(5), start).await.unwrap(), start);
        assert_eq!(tracker.current(ParentId(5)).await.unwrap(), Some(start));
    }

    #[tokio::test]
    async fn never_moves_backwards() {
        let store = store_with_parent().await;
        let tracker = WatermarkTracker::new(&store);
        let later = Utc::now();
        let earlier = later - Duration::minutes(5);

        tracker.advance(ParentId(5), later).await.unwrap();
        assert_eq!(tracker.advance(ParentId(5), earlier).await.unwrap(), later);
        assert_eq!(tracker.current(ParentId(5)).await.unwrap(), Some(later));
    }

    #[tokio::test]
    async fn unknown_parent_is_store_error() {
        let store: MemoryStore<Parent> = MemoryStore::new();
        let err = WatermarkTracker::new(&store)
            .advance(ParentId(1), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(ref e) if e.is_not_found()));
    }
}
