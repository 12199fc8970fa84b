//! # taskmirror engine
//!
//! Incremental pull-sync engine for taskmirror.
//!
//! This crate provides:
//! - Parent registration (idle → listing → registering → syncing → completed)
//! - Lock-step pagination over a remote source
//! - Revision carry-forward so updates replace local records in place
//! - Per-parent watermarks for incremental fetches
//! - A caller-owned index of local parents
//!
//! ## Architecture
//!
//! A refresh lists the remote parents, registers the new ones, reads the
//! revisions of every stored item once, then walks the local parents in id
//! order. For each parent:
//! 1. Fetch items modified since the parent's watermark, page by page
//! 2. Attach stored revisions to known items
//! 3. Bulk-commit the batch
//! 4. Advance the watermark to the instant the fetch started
//!
//! ## Key Invariants
//!
//! - A watermark only moves after every item of its batch was committed
//! - Watermarks never move backwards
//! - An item id maps to exactly one local record
//! - A failing parent never stops the others

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod fetcher;
mod index;
mod merger;
mod model;
mod registrar;
mod remote;
mod watermark;

pub use config::{SyncConfig, DEFAULT_FIELDS, MAX_PAGE_SIZE};
pub use engine::{EngineState, ParentOutcome, ParentSync, RefreshReport, SyncEngine, SyncStats};
pub use error::{FetchError, FetchResult, SyncError, SyncResult};
pub use fetcher::{child_from_raw, FetchedBatch, PageFetcher};
pub use index::{load_index, ParentIndex};
pub use merger::{merge_revisions, MergedBatch, PriorSnapshot};
pub use model::{
    parse_timestamp, ChildItem, ItemId, Parent, ParentId, RemoteParent, ScopeId, MODIFIED_AT_FIELD,
};
pub use registrar::{ParentRegistrar, Registration};
pub use remote::{
    FixtureRemote, ItemQuery, ItemRequest, PageCursor, PageFault, PageMeta, RawPage, RemoteFixture,
    RemoteSource,
};
pub use watermark::{WatermarkTracker, WATERMARK_ATTEMPTS};
