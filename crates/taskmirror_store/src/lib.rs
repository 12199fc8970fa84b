//! # taskmirror store
//!
//! Revisioned document store abstraction for taskmirror.
//!
//! This crate provides the local persistence seam the sync engine writes
//! through. Stores hold typed [`Record`]s keyed by a string [`DocKey`] and
//! guard every update with an opaque [`Revision`].
//!
//! ## Design Principles
//!
//! - Stores know nothing about parents, items or watermarks
//! - Every write must present the record's current revision (none on insert)
//! - A write whose content is unchanged keeps the stored revision
//! - Bulk upserts report one outcome per record; they never fail as a unit
//!   for a single bad record
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral caches
//! - [`FileStore`] - One JSON file per store, replaced atomically on write
//!
//! ## Example
//!
//! ```rust,ignore
//! use taskmirror_store::{DocumentStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let committed = store.put(record).await?;
//! assert!(committed.revision().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod error;
mod file;
mod memory;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::{content_digest, DocKey, Record, Revision};
pub use store::{DocumentStore, WriteOutcome};
