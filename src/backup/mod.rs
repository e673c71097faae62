pub mod db_dump;
pub mod header;
pub mod logic;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::time::timeout;

use crate::config::AppConfig;
use logic::{Attachment, DumpOrchestrator};

/// Public entry point for the backup process: stores the artifact under the
/// configured backup directory.
pub async fn run_backup_flow(app_config: &AppConfig) -> Result<PathBuf> {
    let orchestrator = DumpOrchestrator::new(app_config.database.clone());
    timeout(
        app_config.time_limit,
        orchestrator.store(&app_config.backup_dir, app_config.backup_name.as_deref()),
    )
    .await
    .with_context(|| time_limit_exceeded(app_config))?
    .with_context(|| {
        format!(
            "Failed to store backup of {} in {}",
            app_config.database.db_name,
            app_config.backup_dir.display()
        )
    })
}

/// Streams the artifact to stdout, for piping into another tool or a
/// web server's response body.
pub async fn run_download_flow(app_config: &AppConfig) -> Result<Attachment> {
    let orchestrator = DumpOrchestrator::new(app_config.database.clone());
    let mut stdout = tokio::io::stdout();
    timeout(
        app_config.time_limit,
        orchestrator.deliver(app_config.backup_name.as_deref(), &mut stdout),
    )
    .await
    .with_context(|| time_limit_exceeded(app_config))?
    .with_context(|| format!("Failed to deliver backup of {}", app_config.database.db_name))
}

fn time_limit_exceeded(app_config: &AppConfig) -> String {
    format!(
        "Backup of {} did not finish within {} seconds",
        app_config.database.db_name,
        app_config.time_limit.as_secs()
    )
}
