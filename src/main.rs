//! MySQL Backup/Restore Tool
//!
//! Provides CLI interface for dump, download and restore operations

// sqlbackup/src/main.rs
use anyhow::{Context, Result};
use sqlbackup::errors::BackupError;
use sqlbackup::{AppConfig, backup, restore};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_VAR: &str = "SQLBACKUP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Main entry point for the backup/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run_app().await {
        Ok(_) => {
            eprintln!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(fatal) = e
                .downcast_ref::<BackupError>()
                .filter(|err| err.is_fatal_for_export())
            {
                eprintln!("❌ {}", fatal);
            }
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    let config_path = env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let app_config = AppConfig::load_from_json(&config_path).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            config_path.display()
        )
    })?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    match choice.as_str() {
        "1" | "backup" => {
            eprintln!("🚀 Starting Backup Process...");
            let path = backup::run_backup_flow(&app_config)
                .await
                .context("Backup process failed")?;
            eprintln!("📦 Backup written to {}", path.display());
        }
        "2" | "download" => {
            // stdout carries the artifact; everything else goes to stderr.
            let attachment = backup::run_download_flow(&app_config)
                .await
                .context("Download process failed")?;
            for (name, value) in attachment.headers() {
                tracing::info!("{}: {}", name, value);
            }
        }
        "3" | "restore" => {
            eprintln!("🔄 Starting Restore Process...");
            let source = args.get(2).map(PathBuf::from);
            let report = restore::run_restore_flow(&app_config, source)
                .await
                .context("Restore process failed")?;
            eprintln!("{}", report.summary());
        }
        _ => {
            eprintln!("❌ Invalid choice. Please enter '1' (backup), '2' (download), or '3' (restore).");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stderr};

    eprintln!("Select an operation:");
    eprintln!("1. Take Backup (or type 'backup')");
    eprintln!("2. Download Backup to stdout (or type 'download')");
    eprintln!("3. Restore Backup (or type 'restore')");
    eprint!("Enter your choice: ");
    stderr().flush().context("Failed to flush stderr")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
