//! Refresh orchestration.

use crate::config::SyncConfig;
use crate::error::{FetchError, SyncError, SyncResult};
use crate::fetcher::PageFetcher;
use crate::index::{load_index, ParentIndex};
use crate::merger::{merge_revisions, PriorSnapshot};
use crate::model::{ChildItem, Parent, ParentId};
use crate::registrar::ParentRegistrar;
use crate::remote::{ItemQuery, RemoteSource};
use crate::watermark::WatermarkTracker;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskmirror_store::DocumentStore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No refresh has run yet.
    Idle,
    /// Listing parents from the remote.
    ListingParents,
    /// Creating local records for new parents.
    Registering,
    /// Reading the prior item snapshot.
    Snapshotting,
    /// Syncing parents one at a time.
    Syncing,
    /// The last refresh ran to the end.
    Completed,
    /// The last refresh was aborted.
    Failed,
}

impl EngineState {
    /// Returns true while a refresh is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EngineState::ListingParents
                | EngineState::Registering
                | EngineState::Snapshotting
                | EngineState::Syncing
        )
    }
}

/// Statistics about refresh runs.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Refreshes that ran to the end, even with per-parent failures.
    pub refreshes_completed: u64,
    /// Items written across all refreshes.
    pub items_committed: u64,
    /// Parents synced successfully.
    pub parents_synced: u64,
    /// Parents whose sync failed.
    pub parents_failed: u64,
    /// When the last refresh finished.
    pub last_refresh_time: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of syncing one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentSync {
    /// Pages fetched.
    pub pages: u32,
    /// Items fetched, duplicates included.
    pub fetched: usize,
    /// Items committed without a prior local record.
    pub inserted: usize,
    /// Items committed over a prior local record.
    pub updated: usize,
    /// Repeated arrivals folded into one record.
    pub duplicates: usize,
    /// Watermark stored after the commit.
    pub watermark: DateTime<Utc>,
}

/// Outcome for one parent of a refresh.
#[derive(Debug)]
pub struct ParentOutcome {
    /// The parent.
    pub parent_id: ParentId,
    /// Display name of the parent.
    pub name: String,
    /// What happened.
    pub result: SyncResult<ParentSync>,
}

/// Result of a refresh.
#[derive(Debug)]
pub struct RefreshReport {
    /// Parents registered by this refresh.
    pub registered: Vec<ParentId>,
    /// One outcome per local parent, in id order.
    pub outcomes: Vec<ParentOutcome>,
    /// Duration of the refresh.
    pub duration: Duration,
}

impl RefreshReport {
    /// Returns true if every parent synced.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Returns the outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ParentOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Returns the number of items committed across all parents.
    pub fn items_committed(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|s| s.inserted + s.updated)
            .sum()
    }
}

/// Marks a refresh as failed if it is dropped before finishing.
struct ActiveRun<'a> {
    state: &'a RwLock<EngineState>,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if state.is_active() {
            *state = EngineState::Failed;
        }
    }
}

/// Mirrors a remote scope's parents and their items into local stores.
///
/// One refresh runs at a time per engine. Parents are synced one after
/// another; each parent's items are fetched, merged against the stored
/// revisions, committed, and only then is the parent's watermark advanced.
pub struct SyncEngine<S, P, I>
where
    S: RemoteSource,
    P: DocumentStore<Parent>,
    I: DocumentStore<ChildItem>,
{
    config: SyncConfig,
    source: Arc<S>,
    parents: Arc<P>,
    items: Arc<I>,
    state: RwLock<EngineState>,
    stats: RwLock<SyncStats>,
}

impl<S, P, I> SyncEngine<S, P, I>
where
    S: RemoteSource,
    P: DocumentStore<Parent>,
    I: DocumentStore<ChildItem>,
{
    /// Creates a new sync engine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SyncConfig, source: S, parents: P, items: I) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source: Arc::new(source),
            parents: Arc::new(parents),
            items: Arc::new(items),
            state: RwLock::new(EngineState::Idle),
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the remote source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Gets the parent store.
    pub fn parent_store(&self) -> &P {
        &self.parents
    }

    /// Gets the item store.
    pub fn item_store(&self) -> &I {
        &self.items
    }

    /// Gets the current state.
    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: EngineState) {
        *self.state.write() = state;
    }

    fn begin(&self) -> SyncResult<ActiveRun<'_>> {
        let mut state = self.state.write();
        if state.is_active() {
            return Err(SyncError::AlreadyRunning);
        }
        *state = EngineState::ListingParents;
        Ok(ActiveRun { state: &self.state })
    }

    fn abort(&self, err: SyncError) -> SyncError {
        match err.parent_id() {
            Some(parent) => error!(parent = %parent, error = %err, "refresh aborted"),
            None => error!(error = %err, "refresh aborted"),
        }
        self.set_state(EngineState::Failed);
        self.stats.write().last_error = Some(err.to_string());
        err
    }

    /// Runs one refresh of every local parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent listing, registration or prior
    /// snapshot fails, or if another refresh is running. Per-parent
    /// failures are reported in the [`RefreshReport`] instead.
    pub async fn refresh(&self) -> SyncResult<RefreshReport> {
        let _run = self.begin()?;
        let start = Instant::now();
        info!(scope = %self.config.scope, "refresh started");

        let listed = match self.source.list_parents(self.config.scope).await {
            Ok(listed) => listed,
            Err(e) => return Err(self.abort(e.into())),
        };

        self.set_state(EngineState::Registering);
        let registration = match ParentRegistrar::new(self.parents.as_ref())
            .verbose(self.config.verbose)
            .register(&listed)
            .await
        {
            Ok(registration) => registration,
            Err(e) => return Err(self.abort(e)),
        };
        let local = ParentIndex::new(registration.parents);

        self.set_state(EngineState::Snapshotting);
        let prior = match self.items.list_all().await {
            Ok(items) => PriorSnapshot::from_items(items),
            Err(e) => return Err(self.abort(e.into())),
        };
        if prior.is_empty() {
            debug!("no cached items");
        } else {
            debug!(items = prior.len(), "prior snapshot taken");
        }

        self.set_state(EngineState::Syncing);
        let mut outcomes = Vec::with_capacity(local.len());
        for parent in local.iter() {
            let result = self.sync_parent(parent, &prior).await;
            match &result {
                Ok(sync) => info!(
                    parent = %parent.id,
                    name = %parent.name,
                    pages = sync.pages,
                    inserted = sync.inserted,
                    updated = sync.updated,
                    "parent synced"
                ),
                Err(e) => warn!(parent = %parent.id, name = %parent.name, error = %e, "parent sync failed"),
            }
            outcomes.push(ParentOutcome {
                parent_id: parent.id,
                name: parent.name.clone(),
                result,
            });
        }

        let report = RefreshReport {
            registered: registration.created,
            outcomes,
            duration: start.elapsed(),
        };

        {
            let mut stats = self.stats.write();
            stats.refreshes_completed += 1;
            stats.items_committed += report.items_committed() as u64;
            stats.parents_failed += report.failures().count() as u64;
            stats.parents_synced += (report.outcomes.len() - report.failures().count()) as u64;
            stats.last_refresh_time = Some(Utc::now());
            stats.last_error = report
                .failures()
                .last()
                .and_then(|o| o.result.as_ref().err())
                .map(ToString::to_string);
        }
        self.set_state(EngineState::Completed);

        info!(
            parents = report.outcomes.len(),
            failed = report.failures().count(),
            items = report.items_committed(),
            duration_ms = report.duration.as_millis() as u64,
            "refresh finished"
        );
        Ok(report)
    }

    /// Fetches, merges and commits one parent's items, then advances its
    /// watermark.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the watermark is left unchanged unless
    /// every item was committed.
    pub async fn sync_parent(
        &self,
        parent: &Parent,
        prior: &PriorSnapshot,
    ) -> SyncResult<ParentSync> {
        let parent_id = parent.id;
        let tracker = WatermarkTracker::new(self.parents.as_ref());
        // The stored record wins over a possibly stale caller copy
        let since = tracker.current(parent_id).await?;
        let window_start = Utc::now();

        let query = ItemQuery {
            scope: self.config.scope,
            parent_id,
            fields: self.config.field_selection(),
            modified_since: since.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            page_size: self.config.page_size,
        };
        let fetcher = PageFetcher::new(self.source.as_ref(), query, self.config.page_timeout)
            .verbose(self.config.verbose)
            .label(parent.name.as_str());
        let batch = timeout(self.config.parent_timeout, fetcher.collect_all())
            .await
            .map_err(|_| FetchError::Deadline(self.config.parent_timeout))??;

        let fetched = batch.items.len();
        let merged = merge_revisions(batch.items, prior);
        let total = merged.items.len();

        if total > 0 {
            let outcomes = self
                .items
                .bulk_upsert(merged.items)
                .await
                .map_err(|e| SyncError::Commit {
                    parent_id,
                    rejected: total,
                    total,
                    reason: e.to_string(),
                })?;

            let mut failures = outcomes.iter().filter_map(|o| o.result.as_ref().err());
            if let Some(first) = failures.next() {
                return Err(SyncError::Commit {
                    parent_id,
                    rejected: failures.count() + 1,
                    total,
                    reason: first.to_string(),
                });
            }
            if outcomes.len() != total {
                return Err(SyncError::Commit {
                    parent_id,
                    rejected: total.saturating_sub(outcomes.len()),
                    total,
                    reason: format!("store reported {} outcomes", outcomes.len()),
                });
            }
        }

        let watermark = tracker.advance(parent_id, window_start).await?;

        Ok(ParentSync {
            pages: batch.pages,
            fetched,
            inserted: merged.inserts,
            updated: merged.updates,
            duplicates: merged.duplicates,
            watermark,
        })
    }

    /// Reads every local parent into a caller-owned index.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the parent store cannot be read.
    pub async fn load_index(&self) -> SyncResult<ParentIndex> {
        load_index(self.parents.as_ref()).await
    }
}
