mod config;
mod cycle;


use anyhow::Result;
use clap::{Parser, Subcommand};
use config::AgentConfig;
use cycle::collect_cycle;
use hostmon_collector::Collector;
use hostmon_common::{logging, shutdown};
use hostmon_storage::backup;
use hostmon_storage::engine::SqliteSampleStore;
use hostmon_storage::error::StorageError;
use std::path::PathBuf;
use tokio::time::{interval, MissedTickBehavior};

/// Samples CPU, RAM and disk usage into the shared sample database.
#[derive(Parser)]
#[command(name = "hostmon-agent", version, about)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/agent.toml")]
    config: PathBuf,

    /// Run a single collection cycle and exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Copy the database into the backup directory and exit
    Backup,
    /// Replace the database with the newest backup and exit
    Restore,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, status) = AgentConfig::load_or_default(&cli.config);
    let _log_guard = logging::init(config.log_file.as_deref())?;
    status.report(&cli.config);

    match cli.command {
        Some(Command::Backup) => {
            backup::create_backup(&config.database_path, &config.backup_dir, config.backup_keep)?;
            return Ok(());
        }
        Some(Command::Restore) => {
            backup::restore_latest(&config.database_path, &config.backup_dir)?;
            return Ok(());
        }
        None => {}
    }

    let store = SqliteSampleStore::open_lazy(&config.database_path, config.store_options());
    let mut collectors = build_collectors(&config);
    if collectors.is_empty() {
        anyhow::bail!("no sensor with a probe is enabled");
    }

    if cli.once {
        let summary = collect_cycle(&mut collectors, &store);
        tracing::info!(
            stored = summary.stored,
            probe_failures = summary.probe_failures,
            store_failures = summary.store_failures,
            "Collection cycle done"
        );
        return Ok(());
    }

    tracing::info!(
        database = %config.database_path.display(),
        interval_secs = config.collection_interval().as_secs(),
        sensors = collectors.len(),
        "hostmon-agent starting"
    );

    if config.backup_on_start_stop {
        take_backup(&config);
    }

    let shutdown = shutdown::spawn_listener();
    let mut tick = interval(config.collection_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                collect_cycle(&mut collectors, &store);
            }
        }
    }

    if config.backup_on_start_stop {
        take_backup(&config);
    }
    tracing::info!("hostmon-agent stopped");
    Ok(())
}

fn build_collectors(config: &AgentConfig) -> Vec<Box<dyn Collector>> {
    config
        .sensors
        .iter()
        .filter_map(|sensor| {
            let probe = hostmon_collector::for_sensor(sensor, config.disk_mount.as_deref());
            if probe.is_none() {
                tracing::warn!(sensor = %sensor, "No probe for sensor, skipping");
            }
            probe
        })
        .collect()
}

fn take_backup(config: &AgentConfig) {
    match backup::create_backup(&config.database_path, &config.backup_dir, config.backup_keep) {
        Ok(_) => {}
        Err(StorageError::MissingDatabase(_)) => {
            tracing::info!("No database to back up yet")
        }
        Err(e) => tracing::warn!(error = %e, "Backup failed"),
    }
}
