use chrono::{DateTime, Duration, Utc};
use hostmon_common::types::SensorId;
use std::collections::HashMap;

/// Whether a sensor may alert right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Idle,
    Cooling { remaining: Duration },
}

/// Last alert attempt per sensor.
///
/// A sensor is cooling while less than `period` has elapsed since its last
/// attempt. The state depends on time only; readings below the threshold do
/// not end a cooldown early.
pub struct CooldownTracker {
    period: Duration,
    last_alert: HashMap<SensorId, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_alert: HashMap::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Seeds the tracker with previously recorded attempts, keeping the most
    /// recent one when a sensor is already known.
    pub fn restore(&mut self, recorded: HashMap<SensorId, DateTime<Utc>>) {
        for (sensor, at) in recorded {
            let slot = self.last_alert.entry(sensor).or_insert(at);
            if at > *slot {
                *slot = at;
            }
        }
    }

    pub fn state(&self, sensor: &SensorId, now: DateTime<Utc>) -> CooldownState {
        match self.last_alert.get(sensor) {
            Some(last) => {
                // A clock set back counts as no time elapsed.
                let elapsed = (now - *last).max(Duration::zero());
                if elapsed >= self.period {
                    CooldownState::Idle
                } else {
                    CooldownState::Cooling {
                        remaining: self.period - elapsed,
                    }
                }
            }
            None => CooldownState::Idle,
        }
    }

    /// Records an alert attempt at `now`, starting a new cooldown.
    pub fn mark(&mut self, sensor: &SensorId, now: DateTime<Utc>) {
        self.last_alert.insert(sensor.clone(), now);
    }

    pub fn last_alert_at(&self, sensor: &SensorId) -> Option<DateTime<Utc>> {
        self.last_alert.get(sensor).copied()
    }
}
