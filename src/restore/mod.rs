pub mod db_restore;
pub mod logic;
pub mod report;
pub mod splitter;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::time::timeout;

use crate::config::AppConfig;
use logic::{RestoreOrchestrator, SqlSource};
use report::RestoreReport;

/// Public entry point for the restore process. `source` wins over the
/// `restore_source` from the config file.
pub async fn run_restore_flow(
    app_config: &AppConfig,
    source: Option<PathBuf>,
) -> Result<RestoreReport> {
    let path = source
        .or_else(|| app_config.restore_source.clone())
        .context("No restore source given; pass a path or set restore_source in config.json")?;

    tracing::info!(source = %path.display(), database = %app_config.database.db_name, "starting restore");

    let orchestrator = RestoreOrchestrator::new(app_config.database.clone())
        .with_split_mode(app_config.split_mode);

    timeout(
        app_config.time_limit,
        orchestrator.import(SqlSource::from_path(&path), None),
    )
    .await
    .with_context(|| {
        format!(
            "Restore of {} did not finish within {} seconds",
            path.display(),
            app_config.time_limit.as_secs()
        )
    })?
    .with_context(|| format!("Failed to restore {}", path.display()))
}
