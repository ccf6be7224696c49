//! Backup Client - Main entry point
//!
//! Runs one backup pass and exits; scheduling is left to cron or a systemd timer.
//! Exit status 1 means the run was aborted, 2 that it finished with errors.

use anyhow::{Context, Result};
use backup_client::{utils, BackupRun, Config};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Invalid config file {}", args.config.display()))?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting backup-client v{} (storage host: {})",
        env!("CARGO_PKG_VERSION"),
        config.server.url
    );

    let run = BackupRun::from_config(config)?;
    match run.execute().await {
        Ok(report) => {
            if let Some(manifest) = &report.manifest {
                tracing::info!("Manifest: {}", manifest.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_fatal() => Err(e).context("Backup aborted"),
        Err(e) => {
            tracing::error!("Backup finished with errors: {}", e);
            Ok(ExitCode::from(2))
        }
    }
}
