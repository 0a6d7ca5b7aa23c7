use anyhow::Result;
use clap::Parser;
use hypobackup::backup::BackupDir;
use hypobackup::config::{Cli, Config, default_config_path};
use hypobackup::hypothesis::HypothesisClient;
use hypobackup::sync::{SyncStats, run_once};
use hypobackup::unpack_error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config_path = args
        .config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %unpack_error(&*e), path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    match run(&cfg, args.reset).await {
        Ok(stats) => tracing::info!(
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            writes = stats.writes(),
            "sync complete"
        ),
        Err(e) => {
            tracing::error!(error = %unpack_error(&*e), "sync failed, state not saved");
            std::process::exit(1);
        }
    }
}

async fn run(cfg: &Config, reset: bool) -> Result<SyncStats> {
    let backup = BackupDir::new(cfg.backup.get_dir())?;
    let client = HypothesisClient::new(&cfg.hypothesis)?;

    run_once(
        &client,
        &backup,
        &cfg.backup.get_state_path(),
        cfg.backup.get_utc_offset()?,
        reset,
    )
    .await
}
