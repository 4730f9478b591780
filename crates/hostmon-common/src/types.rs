use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// Textual layout of the `timestamp_complet` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifier of a probe whose readings are stored and checked.
///
/// The three built-in probes have dedicated variants; any other key is kept
/// verbatim in [`SensorId::Custom`].
///
/// # Examples
///
/// ```
/// use hostmon_common::types::SensorId;
///
/// let id: SensorId = "CPU".parse().unwrap();
/// assert_eq!(id, SensorId::Cpu);
/// assert_eq!(id.to_string(), "cpu");
/// assert_eq!(SensorId::from("gpu"), SensorId::Custom("gpu".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorId {
    Cpu,
    Ram,
    Disk,
    Custom(String),
}

impl SensorId {
    pub fn as_str(&self) -> &str {
        match self {
            SensorId::Cpu => "cpu",
            SensorId::Ram => "ram",
            SensorId::Disk => "disk",
            SensorId::Custom(name) => name,
        }
    }

    /// The probes shipped with the agent, in collection order.
    pub fn builtin() -> [SensorId; 3] {
        [SensorId::Cpu, SensorId::Ram, SensorId::Disk]
    }
}

impl From<&str> for SensorId {
    fn from(s: &str) -> Self {
        let key = s.trim();
        match key.to_lowercase().as_str() {
            "cpu" => SensorId::Cpu,
            "ram" => SensorId::Ram,
            "disk" => SensorId::Disk,
            _ => SensorId::Custom(key.to_string()),
        }
    }
}

impl From<String> for SensorId {
    fn from(s: String) -> Self {
        SensorId::from(s.as_str())
    }
}

impl From<SensorId> for String {
    fn from(id: SensorId) -> Self {
        match id {
            SensorId::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl std::str::FromStr for SensorId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SensorId::from(s))
    }
}

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored probe reading.
///
/// `sequence_id` is assigned by the store and is the only ordering key:
/// two samples may share a `captured_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sequence_id: i64,
    pub sensor: SensorId,
    pub value: f64,
    pub captured_at: NaiveDateTime,
}

/// Current local wall-clock time truncated to whole seconds.
pub fn now_local_seconds() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}
