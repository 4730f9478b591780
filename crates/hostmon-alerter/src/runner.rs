use crate::config::AlerterConfig;
use hostmon_alert::engine::{AlertEngine, Outcome, SensorReport};
use hostmon_notify::channels::email::EmailNotifier;
use hostmon_notify::channels::log::LogNotifier;
use hostmon_notify::Notifier;
use hostmon_storage::engine::{SqliteSampleStore, StoreOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Counts of the outcomes of one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub no_data: usize,
    pub normal: usize,
    pub suppressed: usize,
    pub alerted: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn from_reports(reports: &[SensorReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                Outcome::NoData => summary.no_data += 1,
                Outcome::Normal { .. } => summary.normal += 1,
                Outcome::Suppressed { .. } => summary.suppressed += 1,
                Outcome::Alerted { .. } => summary.alerted += 1,
                Outcome::NotifyFailed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

/// Builds the engine described by `config`.
///
/// Must be called inside a tokio runtime when `[smtp]` is set. An unusable
/// `[smtp]` section is logged and replaced by the log notifier.
pub fn build_engine(config: &AlerterConfig) -> AlertEngine {
    let store = Arc::new(SqliteSampleStore::open_lazy(
        &config.database_path,
        StoreOptions::default(),
    ));

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => match EmailNotifier::new(smtp, config.notify_timeout()) {
            Ok(email) => Arc::new(email),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid [smtp] section, alerts will only be logged");
                Arc::new(LogNotifier)
            }
        },
        None => {
            tracing::info!("No [smtp] section, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let thresholds = config.thresholds();
    for t in &thresholds {
        tracing::info!(sensor = %t.sensor, threshold = t.threshold, "Watching sensor");
    }

    let mut engine = AlertEngine::new(thresholds, config.cooldown(), store.clone(), notifier)
        .with_notify_timeout(config.notify_timeout());
    if config.persist_cooldowns {
        engine = engine.with_cooldown_store(store);
    }
    engine
}

/// Evaluates every sensor once.
pub async fn run_pass(engine: &mut AlertEngine) -> PassSummary {
    let reports = engine.evaluate_all().await;
    let summary = PassSummary::from_reports(&reports);
    tracing::info!(
        alerted = summary.alerted,
        suppressed = summary.suppressed,
        failed = summary.failed,
        normal = summary.normal,
        no_data = summary.no_data,
        "Check pass done"
    );
    summary
}

/// Runs a pass every `period` until `shutdown` is cancelled and returns the
/// number of passes run. A pass already started is finished first.
pub async fn run_loop(
    engine: &mut AlertEngine,
    period: Duration,
    shutdown: CancellationToken,
) -> u64 {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut passes = 0;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                run_pass(engine).await;
                passes += 1;
            }
        }
    }
    passes
}
