//! Retention-bounded sample storage for probe readings.
//!
//! The default implementation ([`engine::SqliteSampleStore`]) keeps every
//! reading in the `sondes` table of a single SQLite database opened in WAL
//! mode, so one collecting process can write while the alerter and other
//! readers query the same file. The same database also holds the optional
//! persisted alert cooldowns; see [`CooldownStore`].

pub mod backup;
pub mod engine;
pub mod error;


use chrono::{DateTime, NaiveDateTime, Utc};
use error::Result;
use hostmon_common::types::{now_local_seconds, Sample, SensorId};
use std::collections::HashMap;

/// Row count kept by the store unless configured otherwise.
pub const DEFAULT_RETENTION_LIMIT: u64 = 500;

/// Append-only store of probe readings with bounded size.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the store is read by the alert loop while probes append to it.
pub trait SampleStore: Send + Sync {
    /// Stores a reading captured at `captured_at` and returns its sequence id.
    ///
    /// Appending for the trigger sensor also runs
    /// [`evict_oldest`](Self::evict_oldest) with the retention limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the reading could not be written. The store does
    /// not retry; the reading is lost.
    fn append_at(&self, sensor: &SensorId, value: f64, captured_at: NaiveDateTime) -> Result<i64>;

    /// Stores a reading stamped with the current local time.
    fn append(&self, sensor: &SensorId, value: f64) -> Result<i64> {
        self.append_at(sensor, value, now_local_seconds())
    }

    /// Returns the reading with the highest sequence id for `sensor`.
    ///
    /// `None` covers both "never reported" and a failed read; failures are
    /// logged by the implementation.
    fn latest_sample(&self, sensor: &SensorId) -> Option<Sample>;

    /// Value of [`latest_sample`](Self::latest_sample).
    fn latest_value(&self, sensor: &SensorId) -> Option<f64> {
        self.latest_sample(sensor).map(|s| s.value)
    }

    /// Total number of stored readings across all sensors.
    fn row_count(&self) -> Result<u64>;

    /// Deletes the `max(0, row_count - keep)` readings with the lowest
    /// sequence ids. Returns the number of rows removed.
    fn evict_oldest(&self, keep: u64) -> Result<u64>;

    /// The configured row limit.
    fn retention_limit(&self) -> u64;

    /// Newest readings first, at most `limit` of them.
    fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>>;
}

/// Persistence for the time of the last alert attempt per sensor, so that
/// cooldowns survive a restart of the alerter.
pub trait CooldownStore: Send + Sync {
    /// Loads every recorded cooldown start.
    fn load_cooldowns(&self) -> Result<HashMap<SensorId, DateTime<Utc>>>;

    /// Records `at` as the last alert attempt for `sensor`, replacing any
    /// previous value.
    fn record_cooldown(&self, sensor: &SensorId, at: DateTime<Utc>) -> Result<()>;
}
