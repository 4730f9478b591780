#![allow(dead_code)]

use async_trait::async_trait;
use hostmon_alert::engine::AlertEngine;
use hostmon_alert::SensorThreshold;
use hostmon_notify::error::Result as NotifyResult;
use hostmon_notify::Notifier;
use hostmon_storage::engine::{SqliteSampleStore, StoreOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
pub struct RecordingNotifier {
    pub subjects: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.subjects.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, _body: &str) -> NotifyResult<()> {
        self.subjects.lock().unwrap().push(subject.to_string());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteSampleStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("samples.sqlite")
    }

    pub fn engine(&self, sensors: Vec<SensorThreshold>) -> AlertEngine {
        AlertEngine::new(
            sensors,
            chrono::Duration::minutes(30),
            self.store.clone(),
            self.notifier.clone(),
        )
    }
}

pub fn build_test_context() -> TestContext {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteSampleStore::open(
        &temp_dir.path().join("samples.sqlite"),
        StoreOptions::default(),
    )
    .unwrap();
    TestContext {
        temp_dir,
        store: Arc::new(store),
        notifier: Arc::new(RecordingNotifier::default()),
    }
}

/// Writes `content` as a config file in `dir` and returns its path.
pub fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("alerter.toml");
    std::fs::write(&path, content).unwrap();
    path
}
