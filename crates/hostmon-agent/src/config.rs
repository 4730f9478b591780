use hostmon_common::config::{self, ConfigStatus};
use hostmon_common::types::SensorId;
use hostmon_storage::backup::DEFAULT_KEEP;
use hostmon_storage::engine::StoreOptions;
use hostmon_storage::DEFAULT_RETENTION_LIMIT;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Append-only log file, in addition to stdout.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
    #[serde(default = "default_retention_limit")]
    pub retention_limit: u64,
    /// Appends for this sensor run the retention check.
    #[serde(default = "default_trigger_sensor")]
    pub trigger_sensor: SensorId,
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorId>,
    /// Measure only this mount point instead of every disk.
    #[serde(default)]
    pub disk_mount: Option<String>,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_backup_keep")]
    pub backup_keep: usize,
    #[serde(default = "default_backup_on_start_stop")]
    pub backup_on_start_stop: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/table_sondes.sqlite")
}

fn default_collection_interval() -> u64 {
    3
}

fn default_retention_limit() -> u64 {
    DEFAULT_RETENTION_LIMIT
}

fn default_trigger_sensor() -> SensorId {
    SensorId::Cpu
}

fn default_sensors() -> Vec<SensorId> {
    SensorId::builtin().to_vec()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("data/backups")
}

fn default_backup_keep() -> usize {
    DEFAULT_KEEP
}

fn default_backup_on_start_stop() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_file: None,
            collection_interval_secs: default_collection_interval(),
            retention_limit: default_retention_limit(),
            trigger_sensor: default_trigger_sensor(),
            sensors: default_sensors(),
            disk_mount: None,
            backup_dir: default_backup_dir(),
            backup_keep: default_backup_keep(),
            backup_on_start_stop: default_backup_on_start_stop(),
        }
    }
}

impl AgentConfig {
    pub fn load_or_default(path: &Path) -> (Self, ConfigStatus) {
        config::load_or_default(path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            retention_limit: self.retention_limit,
            trigger_sensor: self.trigger_sensor.clone(),
        }
    }

    /// Collection period, never shorter than one second.
    pub fn collection_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.collection_interval_secs.max(1))
    }
}
