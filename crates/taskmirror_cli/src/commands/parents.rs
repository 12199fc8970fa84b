//! Parents command implementation.

use super::{ensure_cache, PARENTS_STORE};
use serde::Serialize;
use std::path::Path;
use taskmirror_engine::{load_index, Parent, ParentIndex};
use taskmirror_store::FileStore;

/// One row of the parent listing.
#[derive(Debug, Serialize)]
pub struct ParentRow {
    /// Parent id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Watermark, if the parent was synced.
    pub last_updated: Option<String>,
}

/// Runs the parents command.
pub async fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    ensure_cache(path)?;
    let store: FileStore<Parent> = FileStore::open(path, PARENTS_STORE).await?;
    let rows = rows(&load_index(&store).await?);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            println!("{:<20} {:<32} LAST UPDATED", "ID", "NAME");
            for row in &rows {
                println!(
                    "{:<20} {:<32} {}",
                    row.id,
                    row.name,
                    row.last_updated.as_deref().unwrap_or("never")
                );
            }
        }
    }

    Ok(())
}

fn rows(index: &ParentIndex) -> Vec<ParentRow> {
    index
        .iter()
        .map(|p| ParentRow {
            id: p.id.0,
            name: p.name.clone(),
            last_updated: p.last_updated.map(|t| t.to_rfc3339()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskmirror_engine::RemoteParent;

    #[test]
    fn rows_follow_index_order() {
        let mut synced = Parent::registered(&RemoteParent::new(20, "later"));
        synced.last_updated = Some(Utc.with_ymd_and_hms(2015, 8, 3, 20, 19, 40).unwrap());
        let index = ParentIndex::new(vec![synced, Parent::registered(&RemoteParent::new(3, "new"))]);

        let rows = rows(&index);
        assert_eq!(rows[0].id, 3);
        assert!(rows[0].last_updated.is_none());
        assert_eq!(rows[1].last_updated.as_deref(), Some("2015-08-03T20:19:40+00:00"));
    }

    #[tokio::test]
    async fn missing_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), "text").await.is_err());
    }
}
