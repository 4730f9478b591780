use crate::cooldown::{CooldownState, CooldownTracker};
use crate::message::AlertMessage;
use crate::SensorThreshold;
use chrono::{DateTime, Duration, Utc};
use hostmon_common::types::SensorId;
use hostmon_notify::error::NotifyError;
use hostmon_notify::Notifier;
use hostmon_storage::{CooldownStore, SampleStore};
use std::sync::Arc;

/// Used when no notify timeout is configured.
pub const DEFAULT_NOTIFY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// What one evaluation decided for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No reading stored, or the store could not be read.
    NoData,
    Normal { value: f64, threshold: f64 },
    /// Breach inside an open cooldown; nothing was sent.
    Suppressed {
        value: f64,
        threshold: f64,
        remaining: Duration,
    },
    Alerted { value: f64, threshold: f64 },
    /// Breach notified but delivery failed. The cooldown is still consumed.
    NotifyFailed {
        value: f64,
        threshold: f64,
        error: String,
    },
}

impl Outcome {
    /// True when the notifier was invoked.
    pub fn attempted(&self) -> bool {
        matches!(self, Outcome::Alerted { .. } | Outcome::NotifyFailed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReport {
    pub sensor: SensorId,
    pub outcome: Outcome,
}

pub struct AlertEngine {
    sensors: Vec<SensorThreshold>,
    cooldowns: CooldownTracker,
    store: Arc<dyn SampleStore>,
    notifier: Arc<dyn Notifier>,
    notify_timeout: std::time::Duration,
    cooldown_store: Option<Arc<dyn CooldownStore>>,
}

impl AlertEngine {
    pub fn new(
        sensors: Vec<SensorThreshold>,
        cooldown: Duration,
        store: Arc<dyn SampleStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sensors,
            cooldowns: CooldownTracker::new(cooldown),
            store,
            notifier,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            cooldown_store: None,
        }
    }

    pub fn with_notify_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Persists every alert attempt to `store` and resumes the cooldowns it
    /// already holds. A store that cannot be read leaves all sensors idle.
    pub fn with_cooldown_store(mut self, store: Arc<dyn CooldownStore>) -> Self {
        match store.load_cooldowns() {
            Ok(recorded) => {
                tracing::info!(count = recorded.len(), "Restored alert cooldowns");
                self.cooldowns.restore(recorded);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load alert cooldowns"),
        }
        self.cooldown_store = Some(store);
        self
    }

    pub fn sensors(&self) -> &[SensorThreshold] {
        &self.sensors
    }

    /// Name of the channel alerts are delivered through.
    pub fn channel_name(&self) -> &str {
        self.notifier.channel_name()
    }

    pub fn cooldown_state(&self, sensor: &SensorId, now: DateTime<Utc>) -> CooldownState {
        self.cooldowns.state(sensor, now)
    }

    pub fn last_alert_at(&self, sensor: &SensorId) -> Option<DateTime<Utc>> {
        self.cooldowns.last_alert_at(sensor)
    }

    pub async fn evaluate_all(&mut self) -> Vec<SensorReport> {
        self.evaluate_all_at(Utc::now()).await
    }

    /// Runs one pass over every configured sensor, in configuration order,
    /// as if the current time were `now`.
    pub async fn evaluate_all_at(&mut self, now: DateTime<Utc>) -> Vec<SensorReport> {
        let mut reports = Vec::with_capacity(self.sensors.len());
        for i in 0..self.sensors.len() {
            let target = self.sensors[i].clone();
            let outcome = self.evaluate(&target, now).await;
            reports.push(SensorReport {
                sensor: target.sensor,
                outcome,
            });
        }
        reports
    }

    async fn evaluate(&mut self, target: &SensorThreshold, now: DateTime<Utc>) -> Outcome {
        let sensor = &target.sensor;
        let threshold = target.threshold;

        let Some(sample) = self.store.latest_sample(sensor) else {
            tracing::warn!(sensor = %sensor, "Sensor data unavailable");
            return Outcome::NoData;
        };
        let value = sample.value;

        if !target.is_breached_by(value) {
            tracing::info!(sensor = %sensor, value, threshold, "Sensor normal");
            return Outcome::Normal { value, threshold };
        }

        tracing::info!(sensor = %sensor, value, threshold, "Threshold breach detected");

        if let CooldownState::Cooling { remaining } = self.cooldowns.state(sensor, now) {
            tracing::info!(
                sensor = %sensor,
                value,
                threshold,
                remaining_secs = remaining.num_seconds(),
                "Alert suppressed (cooldown)"
            );
            return Outcome::Suppressed {
                value,
                threshold,
                remaining,
            };
        }

        // The cooldown is consumed by the attempt, whatever the delivery result.
        self.cooldowns.mark(sensor, now);
        if let Some(store) = &self.cooldown_store {
            if let Err(e) = store.record_cooldown(sensor, now) {
                tracing::warn!(sensor = %sensor, error = %e, "Failed to persist alert cooldown");
            }
        }

        let message = AlertMessage::render(sensor, value, threshold, sample.captured_at, now);
        match self.deliver(&message).await {
            Ok(()) => {
                tracing::info!(
                    sensor = %sensor,
                    value,
                    threshold,
                    channel = self.notifier.channel_name(),
                    subject = %message.subject,
                    "Alert sent"
                );
                Outcome::Alerted { value, threshold }
            }
            Err(e) => {
                tracing::error!(
                    sensor = %sensor,
                    value,
                    threshold,
                    channel = self.notifier.channel_name(),
                    error = %e,
                    "Alert delivery failed"
                );
                Outcome::NotifyFailed {
                    value,
                    threshold,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        let send = self.notifier.send(&message.subject, &message.body);
        match tokio::time::timeout(self.notify_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                channel: self.notifier.channel_name().to_string(),
                secs: self.notify_timeout.as_secs(),
            }),
        }
    }
}
