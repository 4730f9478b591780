use hostmon_alert::{default_thresholds, SensorThreshold};
use hostmon_common::config::{self, ConfigStatus};
use hostmon_common::types::SensorId;
use hostmon_notify::channels::email::EmailConfig;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AlerterConfig {
    /// Sensor name to percentage. Built-in sensors left out keep their
    /// default threshold.
    #[serde(default)]
    pub thresholds: ThresholdTable,
    /// Minimum time between two alerts for the same sensor.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: f64,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Upper bound on one notifier call.
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
    /// Keep cooldowns in the database so they survive a restart.
    #[serde(default)]
    pub persist_cooldowns: bool,
    /// Alerts are only logged when absent.
    #[serde(default)]
    pub smtp: Option<EmailConfig>,
}

const MAX_COOLDOWN_MINUTES: f64 = 365.0 * 24.0 * 60.0;

fn default_cooldown_minutes() -> f64 {
    30.0
}

fn default_check_interval() -> u64 {
    300
}

fn default_notify_timeout() -> u64 {
    30
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/table_sondes.sqlite")
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("logs/alerts.log"))
}

impl Default for AlerterConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            cooldown_minutes: default_cooldown_minutes(),
            check_interval_secs: default_check_interval(),
            notify_timeout_secs: default_notify_timeout(),
            database_path: default_database_path(),
            log_file: default_log_file(),
            persist_cooldowns: false,
            smtp: None,
        }
    }
}

impl AlerterConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        config::load(path)
    }

    pub fn load_or_default(path: &Path) -> (Self, ConfigStatus) {
        config::load_or_default(path)
    }

    /// Thresholds in evaluation order: entries as written in the file, then
    /// any built-in sensor the file leaves out.
    pub fn thresholds(&self) -> Vec<SensorThreshold> {
        let defaults = default_thresholds();
        let default_for = |sensor: &SensorId| {
            defaults
                .iter()
                .find(|t| &t.sensor == sensor)
                .map(|t| t.threshold)
        };

        let mut resolved: Vec<SensorThreshold> = Vec::new();
        for (name, raw) in &self.thresholds.0 {
            let sensor = SensorId::from(name.as_str());
            if resolved.iter().any(|t| t.sensor == sensor) {
                tracing::warn!(sensor = %sensor, "Duplicate threshold ignored");
                continue;
            }
            match (parse_threshold(raw), default_for(&sensor)) {
                (Some(threshold), _) => resolved.push(SensorThreshold::new(sensor, threshold)),
                (None, Some(fallback)) => {
                    tracing::warn!(
                        sensor = %sensor,
                        value = %raw,
                        fallback,
                        "Invalid threshold, using default"
                    );
                    resolved.push(SensorThreshold::new(sensor, fallback));
                }
                (None, None) => {
                    tracing::warn!(sensor = %sensor, value = %raw, "Invalid threshold, sensor dropped");
                }
            }
        }

        for default in defaults {
            if !resolved.iter().any(|t| t.sensor == default.sensor) {
                resolved.push(default);
            }
        }
        resolved
    }

    /// Cooldown period, capped at one year.
    pub fn cooldown(&self) -> chrono::Duration {
        let minutes = if self.cooldown_minutes > MAX_COOLDOWN_MINUTES {
            tracing::warn!(
                value = self.cooldown_minutes,
                max = MAX_COOLDOWN_MINUTES,
                "cooldown_minutes too large, capping"
            );
            MAX_COOLDOWN_MINUTES
        } else if self.cooldown_minutes.is_finite() && self.cooldown_minutes >= 0.0 {
            self.cooldown_minutes
        } else {
            tracing::warn!(
                value = self.cooldown_minutes,
                "Invalid cooldown_minutes, using default"
            );
            default_cooldown_minutes()
        };
        chrono::Duration::milliseconds((minutes * 60_000.0).round() as i64)
    }

    /// Loop period, never shorter than one second.
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn notify_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.notify_timeout_secs.max(1))
    }
}

/// Non-negative finite percentage, from an integer or float TOML value.
fn parse_threshold(raw: &toml::Value) -> Option<f64> {
    let value = match raw {
        toml::Value::Integer(i) => *i as f64,
        toml::Value::Float(f) => *f,
        _ => return None,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// The `[thresholds]` table as written, in document order and before
/// validation.
#[derive(Debug, Clone, Default)]
pub struct ThresholdTable(pub Vec<(String, toml::Value)>);

impl<'de> Deserialize<'de> for ThresholdTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ThresholdTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of sensor thresholds")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, value)) = map.next_entry::<String, toml::Value>()? {
                    entries.push((name, value));
                }
                Ok(ThresholdTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
