//! Threshold alerting over the latest stored sample of each sensor.
//!
//! Each evaluation pass reads the newest reading of every configured sensor,
//! compares it with the sensor's threshold and, on a breach, notifies once
//! per cooldown window. Cooldowns are tracked per sensor by
//! [`cooldown::CooldownTracker`] and can optionally be persisted through a
//! [`hostmon_storage::CooldownStore`].

pub mod cooldown;
pub mod engine;
pub mod message;

#[cfg(test)]
mod tests;

use hostmon_common::types::SensorId;
use serde::{Deserialize, Serialize};

/// A monitored sensor and the percentage above which it is in breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorThreshold {
    pub sensor: SensorId,
    pub threshold: f64,
}

impl SensorThreshold {
    pub fn new(sensor: impl Into<SensorId>, threshold: f64) -> Self {
        Self {
            sensor: sensor.into(),
            threshold,
        }
    }

    /// Strictly greater: a reading equal to the threshold is normal.
    pub fn is_breached_by(&self, value: f64) -> bool {
        value > self.threshold
    }
}

/// Thresholds used when the configuration does not name a sensor:
/// cpu 80 %, ram 80 %, disk 85 %.
pub fn default_thresholds() -> Vec<SensorThreshold> {
    vec![
        SensorThreshold::new(SensorId::Cpu, 80.0),
        SensorThreshold::new(SensorId::Ram, 80.0),
        SensorThreshold::new(SensorId::Disk, 85.0),
    ]
}
