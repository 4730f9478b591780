use anyhow::Result;
use clap::Parser;
use hostmon_alerter::config::AlerterConfig;
use hostmon_alerter::runner::{build_engine, run_loop, run_pass};
use hostmon_common::{logging, shutdown};
use std::path::PathBuf;

/// Watches the latest probe readings and notifies on threshold breaches.
#[derive(Parser)]
#[command(name = "hostmon-alerter", version, about)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/alerter.toml")]
    config: PathBuf,

    /// Evaluate every sensor once and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, status) = AlerterConfig::load_or_default(&cli.config);
    let _log_guard = logging::init(config.log_file.as_deref())?;
    status.report(&cli.config);

    let mut engine = build_engine(&config);

    if cli.check {
        tracing::info!("Single check requested");
        run_pass(&mut engine).await;
        return Ok(());
    }

    tracing::info!(
        interval_secs = config.check_interval().as_secs(),
        cooldown_minutes = config.cooldown_minutes,
        channel = engine.channel_name(),
        "hostmon-alerter starting"
    );

    let shutdown = shutdown::spawn_listener();
    let passes = run_loop(&mut engine, config.check_interval(), shutdown).await;

    tracing::info!(passes, "hostmon-alerter stopped");
    Ok(())
}
