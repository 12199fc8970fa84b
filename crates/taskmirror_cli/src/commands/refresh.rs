//! Refresh command implementation.

use super::open_stores;
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskmirror_engine::{FixtureRemote, RefreshReport, RemoteFixture, SyncConfig, SyncEngine};
use tracing::info;

/// Options of one refresh run.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// JSON export of the remote scope.
    pub fixture: PathBuf,
    /// Remote scope id.
    pub scope: u64,
    /// Items requested per page.
    pub page_size: Option<u32>,
    /// Item fields to request.
    pub fields: Option<Vec<String>>,
    /// Per-page deadline in seconds.
    pub page_timeout: Option<u64>,
    /// Log every page.
    pub verbose: bool,
}

impl RefreshOptions {
    /// Builds the engine configuration for these options.
    pub fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(self.scope).with_verbose(self.verbose);
        if let Some(size) = self.page_size {
            config = config.with_page_size(size);
        }
        if let Some(fields) = &self.fields {
            config = config.with_fields(fields.iter().map(|f| f.trim().to_string()));
        }
        if let Some(secs) = self.page_timeout {
            config = config.with_page_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Runs the refresh command.
pub async fn run(path: &Path, options: RefreshOptions) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read(&options.fixture)
        .await
        .map_err(|e| format!("Cannot read fixture {:?}: {e}", options.fixture))?;
    let fixture: RemoteFixture = serde_json::from_slice(&raw)?;
    info!(
        parents = fixture.parents.len(),
        items = fixture.items.len(),
        "loaded remote export"
    );

    let (parents, items) = open_stores(path).await?;
    let engine = SyncEngine::new(
        options.config(),
        FixtureRemote::from_fixture(fixture),
        parents,
        items,
    )?;
    let report = engine.refresh().await?;

    for line in report_lines(&report) {
        println!("{line}");
    }

    let failed = report.failures().count();
    if failed > 0 {
        return Err(format!("{failed} of {} parents failed", report.outcomes.len()).into());
    }
    Ok(())
}

fn report_lines(report: &RefreshReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(sync) => format!(
                "{} ({}): {} pages, {} new, {} updated, watermark {}",
                outcome.parent_id,
                outcome.name,
                sync.pages,
                sync.inserted,
                sync.updated,
                sync.watermark.to_rfc3339()
            ),
            Err(e) if e.is_retryable() => {
                format!("{} ({}): FAILED (retryable) {e}", outcome.parent_id, outcome.name)
            }
            Err(e) => format!("{} ({}): FAILED {e}", outcome.parent_id, outcome.name),
        })
        .collect();
    lines.push(format!(
        "{} parents, {} registered, {} items committed in {:?}",
        report.outcomes.len(),
        report.registered.len(),
        report.items_committed(),
        report.duration
    ));
    lines
}
