//! Inspect command implementation.

use super::{ensure_cache, open_stores};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use taskmirror_engine::{load_index, ChildItem, ParentId, ParentIndex};
use taskmirror_store::DocumentStore;

/// Cache inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Cache path.
    pub path: String,
    /// Number of known parents.
    pub parent_count: usize,
    /// Parents synced at least once.
    pub synced_count: usize,
    /// Number of cached items.
    pub item_count: usize,
    /// Most recent remote modification time among cached items.
    pub latest_modified: Option<String>,
    /// Item counts per parent.
    pub parents: Vec<ParentStats>,
}

/// Statistics for a single parent.
#[derive(Debug, Serialize)]
pub struct ParentStats {
    /// Parent id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Cached items assigned to the parent.
    pub item_count: usize,
}

/// Runs the inspect command.
pub async fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    ensure_cache(path)?;
    let (parents, items) = open_stores(path).await?;
    let index = load_index(&parents).await?;
    let items = items.list_all().await?;

    let result = summarize(path, &index, &items);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn summarize(path: &Path, index: &ParentIndex, items: &[ChildItem]) -> InspectResult {
    let mut per_parent: HashMap<ParentId, usize> = HashMap::new();
    for item in items {
        *per_parent.entry(item.assignee_id).or_default() += 1;
    }

    InspectResult {
        path: path.display().to_string(),
        parent_count: index.len(),
        synced_count: index.len() - index.never_synced().count(),
        item_count: items.len(),
        latest_modified: items
            .iter()
            .filter_map(ChildItem::modified_at)
            .max()
            .map(|t| t.to_rfc3339()),
        parents: index
            .iter()
            .map(|p| ParentStats {
                id: p.id.0,
                name: p.name.clone(),
                item_count: per_parent.get(&p.id).copied().unwrap_or(0),
            })
            .collect(),
    }
}

fn print_text_output(result: &InspectResult) {
    println!("taskmirror Cache Inspection");
    println!("===========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Parents:");
    println!("  Known:  {}", result.parent_count);
    println!("  Synced: {}", result.synced_count);
    println!();
    println!("Items:    {}", result.item_count);
    println!(
        "Newest:   {}",
        result.latest_modified.as_deref().unwrap_or("unknown")
    );

    if !result.parents.is_empty() {
        println!();
        println!("Items per parent:");
        for parent in &result.parents {
            println!("  [{}] {}: {} items", parent.id, parent.name, parent.item_count);
        }
    }
}
