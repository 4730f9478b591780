use crate::error::{Result, StorageError};
use crate::{CooldownStore, SampleStore, DEFAULT_RETENTION_LIMIT};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use hostmon_common::types::{Sample, SensorId, TIMESTAMP_FORMAT};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SAMPLES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sondes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nom_sonde TEXT NOT NULL,
    valeur REAL NOT NULL,
    annee INTEGER,
    mois INTEGER,
    jour INTEGER,
    heure INTEGER,
    minutes INTEGER,
    secondes INTEGER,
    timestamp_complet TEXT
);
CREATE INDEX IF NOT EXISTS idx_sondes_nom_id ON sondes(nom_sonde, id);
";

const ALERT_STATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alert_state (
    sensor TEXT PRIMARY KEY,
    last_alert_at TEXT NOT NULL
);
";

/// How long a statement waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for [`SqliteSampleStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub retention_limit: u64,
    /// Appending for this sensor runs eviction.
    pub trigger_sensor: SensorId,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            retention_limit: DEFAULT_RETENTION_LIMIT,
            trigger_sensor: SensorId::Cpu,
        }
    }
}

/// SQLite-backed [`SampleStore`] and [`CooldownStore`].
///
/// The connection is opened on first use and reopened on the next call if
/// opening failed, so a reader can start before the database exists.
pub struct SqliteSampleStore {
    path: PathBuf,
    options: StoreOptions,
    conn: Mutex<Option<Connection>>,
}

impl SqliteSampleStore {
    /// Opens (creating if needed) the database at `path`, failing if it
    /// cannot be reached.
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        let store = Self::open_lazy(path, options);
        store.with_conn(|_| Ok(()))?;
        Ok(store)
    }

    /// Creates a handle without touching the filesystem. Connection errors
    /// show up on the first operation instead.
    pub fn open_lazy(path: &Path, options: StoreOptions) -> Self {
        Self {
            path: path.to_path_buf(),
            options,
            conn: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Lock the connection slot, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let unavailable = |source| StorageError::Unavailable {
            path: self.path.clone(),
            source,
        };
        let conn = Connection::open(&self.path).map_err(unavailable)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(unavailable)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(unavailable)?;
        conn.execute_batch(SAMPLES_SCHEMA).map_err(unavailable)?;
        conn.execute_batch(ALERT_STATE_SCHEMA)
            .map_err(unavailable)?;
        tracing::info!(path = %self.path.display(), "Opened sample store");
        Ok(conn)
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R>,
    {
        let mut slot = self.lock_conn();
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };
        let result = f(&conn);
        *slot = Some(conn);
        Ok(result?)
    }
}

const SAMPLE_COLUMNS: &str =
    "id, nom_sonde, valeur, timestamp_complet, annee, mois, jour, heure, minutes, secondes";

fn row_to_sample(row: &Row<'_>) -> rusqlite::Result<Sample> {
    let sequence_id: i64 = row.get(0)?;
    let sensor: String = row.get(1)?;
    let value: f64 = row.get(2)?;
    // Other writers may leave the text column NULL or fill it differently.
    let text: Option<String> = row.get::<_, Option<String>>(3).ok().flatten();

    let captured_at = match text
        .as_deref()
        .and_then(|ts| NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok())
    {
        Some(ts) => ts,
        None => {
            let decomposed = decomposed_timestamp(row)?;
            tracing::warn!(
                sequence_id,
                sensor = %sensor,
                timestamp = text.as_deref().unwrap_or("NULL"),
                recovered = decomposed.is_some(),
                "Unreadable sample timestamp"
            );
            decomposed.unwrap_or_default()
        }
    };

    Ok(Sample {
        sequence_id,
        sensor: SensorId::from(sensor),
        value,
        captured_at,
    })
}

/// Rebuilds the capture time from the `annee`..`secondes` columns.
fn decomposed_timestamp(row: &Row<'_>) -> rusqlite::Result<Option<NaiveDateTime>> {
    let mut parts = [0i64; 6];
    for (i, part) in parts.iter_mut().enumerate() {
        match row.get::<_, Option<i64>>(4 + i) {
            Ok(Some(v)) => *part = v,
            Ok(None) | Err(rusqlite::Error::InvalidColumnType(..)) => return Ok(None),
            Err(e) => return Err(e),
        }
    }
    let [year, month, day, hour, minute, second] = parts;
    let date = i32::try_from(year).ok().and_then(|y| {
        NaiveDate::from_ymd_opt(y, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
    });
    let time = date.and_then(|d| {
        d.and_hms_opt(
            u32::try_from(hour).ok()?,
            u32::try_from(minute).ok()?,
            u32::try_from(second).ok()?,
        )
    });
    Ok(time)
}

impl SampleStore for SqliteSampleStore {
    fn append_at(&self, sensor: &SensorId, value: f64, captured_at: NaiveDateTime) -> Result<i64> {
        let sequence_id = self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO sondes (nom_sonde, valeur, annee, mois, jour, heure, minutes, secondes, timestamp_complet)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?
            .execute(params![
                sensor.as_str(),
                value,
                captured_at.year(),
                captured_at.month(),
                captured_at.day(),
                captured_at.hour(),
                captured_at.minute(),
                captured_at.second(),
                captured_at.format(TIMESTAMP_FORMAT).to_string(),
            ])?;
            Ok(conn.last_insert_rowid())
        })?;

        tracing::debug!(sensor = %sensor, value, sequence_id, "Sample stored");

        if *sensor == self.options.trigger_sensor {
            // The reading is already committed; a failed eviction only delays
            // the bound until the next trigger insert.
            match self.evict_oldest(self.options.retention_limit) {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Evicted oldest samples"),
                Err(e) => tracing::warn!(error = %e, "Sample eviction failed"),
            }
        }

        Ok(sequence_id)
    }

    fn latest_sample(&self, sensor: &SensorId) -> Option<Sample> {
        let result = self.with_conn(|conn| {
            conn.prepare_cached(
                &format!(
                    "SELECT {SAMPLE_COLUMNS} FROM sondes
                     WHERE nom_sonde = ?1 ORDER BY id DESC LIMIT 1"
                ),
            )?
            .query_row(params![sensor.as_str()], row_to_sample)
            .optional()
        });

        match result {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(sensor = %sensor, error = %e, "Failed to read latest sample");
                None
            }
        }
    }

    fn row_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sondes", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    fn evict_oldest(&self, keep: u64) -> Result<u64> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM sondes", [], |row| row.get(0))?;
            let excess = count - i64::try_from(keep).unwrap_or(i64::MAX);
            if excess <= 0 {
                return Ok(0);
            }
            let removed = tx.execute(
                "DELETE FROM sondes WHERE id IN (
                     SELECT id FROM sondes ORDER BY id ASC LIMIT ?1
                 )",
                params![excess],
            )?;
            tx.commit()?;
            Ok(removed as u64)
        })
    }

    fn retention_limit(&self) -> u64 {
        self.options.retention_limit
    }

    fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                &format!("SELECT {SAMPLE_COLUMNS} FROM sondes ORDER BY id DESC LIMIT ?1"),
            )?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let samples = stmt
                .query_map(params![limit], row_to_sample)?
                .collect::<rusqlite::Result<Vec<_>>>();
            samples
        })
    }
}

impl CooldownStore for SqliteSampleStore {
    fn load_cooldowns(&self) -> Result<HashMap<SensorId, DateTime<Utc>>> {
        let rows: Vec<(String, String)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT sensor, last_alert_at FROM alert_state")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>();
            rows
        })?;

        let mut cooldowns = HashMap::with_capacity(rows.len());
        for (sensor, at) in rows {
            match DateTime::parse_from_rfc3339(&at) {
                Ok(at) => {
                    cooldowns.insert(SensorId::from(sensor), at.with_timezone(&Utc));
                }
                Err(e) => {
                    tracing::warn!(sensor = %sensor, value = %at, error = %e, "Ignoring unreadable cooldown");
                }
            }
        }
        Ok(cooldowns)
    }

    fn record_cooldown(&self, sensor: &SensorId, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO alert_state (sensor, last_alert_at) VALUES (?1, ?2)
                 ON CONFLICT(sensor) DO UPDATE SET last_alert_at = excluded.last_alert_at",
                params![sensor.as_str(), at.to_rfc3339()],
            )?;
            Ok(())
        })
    }
}
