//! CLI command implementations.

pub mod inspect;
pub mod parents;
pub mod refresh;

use std::path::Path;
use taskmirror_engine::{ChildItem, Parent};
use taskmirror_store::{FileStore, StoreResult};

/// Store holding parent records inside the cache directory.
pub const PARENTS_STORE: &str = "parents";

/// Store holding item records inside the cache directory.
pub const ITEMS_STORE: &str = "items";

/// Opens the parent and item stores of the cache at `path`.
pub async fn open_stores(path: &Path) -> StoreResult<(FileStore<Parent>, FileStore<ChildItem>)> {
    let parents = FileStore::open(path, PARENTS_STORE).await?;
    let items = FileStore::open(path, ITEMS_STORE).await?;
    Ok((parents, items))
}

/// Fails unless a cache has been written at `path`.
pub fn ensure_cache(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let exists = [PARENTS_STORE, ITEMS_STORE]
        .iter()
        .any(|name| path.join(format!("{name}.json")).exists());
    if !exists {
        return Err(format!("No cache found at {:?}", path).into());
    }
    Ok(())
}
