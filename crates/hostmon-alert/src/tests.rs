use crate::cooldown::{CooldownState, CooldownTracker};
use crate::engine::{AlertEngine, Outcome};
use crate::message::AlertMessage;
use crate::{default_thresholds, SensorThreshold};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use hostmon_common::types::{Sample, SensorId};
use hostmon_notify::error::{NotifyError, Result as NotifyResult};
use hostmon_notify::Notifier;
use hostmon_storage::engine::{SqliteSampleStore, StoreOptions};
use hostmon_storage::error::{Result as StorageResult, StorageError};
use hostmon_storage::{CooldownStore, SampleStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn last(&self) -> (String, String) {
        self.sent.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str) -> NotifyResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        if self.fail {
            Err(NotifyError::Smtp("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    async fn send(&self, _subject: &str, _body: &str) -> NotifyResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "hanging"
    }
}

/// A store whose every operation fails, as if the database were gone.
struct UnreachableStore;

impl SampleStore for UnreachableStore {
    fn append_at(
        &self,
        _sensor: &SensorId,
        _value: f64,
        _captured_at: chrono::NaiveDateTime,
    ) -> StorageResult<i64> {
        Err(StorageError::MissingDatabase("gone".into()))
    }

    fn latest_sample(&self, _sensor: &SensorId) -> Option<Sample> {
        None
    }

    fn row_count(&self) -> StorageResult<u64> {
        Err(StorageError::MissingDatabase("gone".into()))
    }

    fn evict_oldest(&self, _keep: u64) -> StorageResult<u64> {
        Err(StorageError::MissingDatabase("gone".into()))
    }

    fn retention_limit(&self) -> u64 {
        500
    }

    fn recent_samples(&self, _limit: usize) -> StorageResult<Vec<Sample>> {
        Err(StorageError::MissingDatabase("gone".into()))
    }
}

#[derive(Default)]
struct MemoryCooldowns {
    recorded: Mutex<HashMap<SensorId, DateTime<Utc>>>,
}

impl CooldownStore for MemoryCooldowns {
    fn load_cooldowns(&self) -> StorageResult<HashMap<SensorId, DateTime<Utc>>> {
        Ok(self.recorded.lock().unwrap().clone())
    }

    fn record_cooldown(&self, sensor: &SensorId, at: DateTime<Utc>) -> StorageResult<()> {
        self.recorded.lock().unwrap().insert(sensor.clone(), at);
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn store() -> (TempDir, Arc<SqliteSampleStore>) {
    let dir = TempDir::new().unwrap();
    let store = SqliteSampleStore::open(&dir.path().join("samples.sqlite"), StoreOptions::default())
        .unwrap();
    (dir, Arc::new(store))
}

fn engine(
    store: Arc<dyn SampleStore>,
    notifier: Arc<dyn Notifier>,
    sensors: Vec<SensorThreshold>,
) -> AlertEngine {
    AlertEngine::new(sensors, Duration::minutes(30), store, notifier)
}

fn cpu_only() -> Vec<SensorThreshold> {
    vec![SensorThreshold::new(SensorId::Cpu, 80.0)]
}

#[test]
fn breach_is_strictly_greater() {
    let t = SensorThreshold::new(SensorId::Ram, 80.0);
    assert!(!t.is_breached_by(80.0));
    assert!(t.is_breached_by(80.01));
    assert!(!t.is_breached_by(f64::NAN));
}

#[test]
fn default_thresholds_cover_builtin_sensors() {
    let defaults = default_thresholds();
    let pairs: Vec<(SensorId, f64)> = defaults
        .into_iter()
        .map(|t| (t.sensor, t.threshold))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (SensorId::Cpu, 80.0),
            (SensorId::Ram, 80.0),
            (SensorId::Disk, 85.0)
        ]
    );
}

#[test]
fn cooldown_tracker_transitions_on_elapsed_time() {
    let mut tracker = CooldownTracker::new(Duration::minutes(30));
    let cpu = SensorId::Cpu;
    assert_eq!(tracker.state(&cpu, t0()), CooldownState::Idle);

    tracker.mark(&cpu, t0());
    assert_eq!(
        tracker.state(&cpu, t0() + Duration::minutes(10)),
        CooldownState::Cooling {
            remaining: Duration::minutes(20)
        }
    );
    // Exactly one period later the sensor is idle again.
    assert_eq!(
        tracker.state(&cpu, t0() + Duration::minutes(30)),
        CooldownState::Idle
    );
    assert_eq!(tracker.state(&SensorId::Ram, t0()), CooldownState::Idle);
}

#[test]
fn clock_set_back_keeps_full_cooldown() {
    let cpu = SensorId::Cpu;

    let mut tracker = CooldownTracker::new(Duration::minutes(30));
    tracker.mark(&cpu, t0());
    assert_eq!(
        tracker.state(&cpu, t0() - Duration::hours(2)),
        CooldownState::Cooling {
            remaining: Duration::minutes(30)
        }
    );

    let mut longest = CooldownTracker::new(Duration::MAX);
    longest.mark(&cpu, t0());
    assert_eq!(
        longest.state(&cpu, t0() - Duration::days(1)),
        CooldownState::Cooling {
            remaining: Duration::MAX
        }
    );
}

#[test]
fn cooldown_restore_keeps_most_recent() {
    let mut tracker = CooldownTracker::new(Duration::minutes(30));
    tracker.mark(&SensorId::Disk, t0());

    let mut recorded = HashMap::new();
    recorded.insert(SensorId::Disk, t0() - Duration::hours(1));
    recorded.insert(SensorId::Ram, t0());
    tracker.restore(recorded);

    assert_eq!(tracker.last_alert_at(&SensorId::Disk), Some(t0()));
    assert_eq!(tracker.last_alert_at(&SensorId::Ram), Some(t0()));
}

#[tokio::test]
async fn cooldown_throttles_repeated_breaches() {
    let (_dir, store) = store();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut engine = engine(store.clone(), notifier.clone(), cpu_only());

    store.append(&SensorId::Cpu, 70.0).unwrap();
    let reports = engine.evaluate_all_at(t0() - Duration::minutes(5)).await;
    assert!(matches!(reports[0].outcome, Outcome::Normal { .. }));
    assert_eq!(notifier.count(), 0);

    store.append(&SensorId::Cpu, 85.0).unwrap();
    let reports = engine.evaluate_all_at(t0()).await;
    assert_eq!(
        reports[0].outcome,
        Outcome::Alerted {
            value: 85.0,
            threshold: 80.0
        }
    );
    assert_eq!(notifier.count(), 1);

    store.append(&SensorId::Cpu, 90.0).unwrap();
    let reports = engine.evaluate_all_at(t0() + Duration::minutes(10)).await;
    assert!(matches!(reports[0].outcome, Outcome::Suppressed { .. }));
    assert_eq!(notifier.count(), 1);

    let reports = engine.evaluate_all_at(t0() + Duration::minutes(31)).await;
    assert!(matches!(reports[0].outcome, Outcome::Alerted { .. }));
    assert_eq!(notifier.count(), 2);
    assert_eq!(
        engine.last_alert_at(&SensorId::Cpu),
        Some(t0() + Duration::minutes(31))
    );
}

#[tokio::test]
async fn sub_threshold_reading_does_not_reset_cooldown() {
    let (_dir, store) = store();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut engine = engine(store.clone(), notifier.clone(), cpu_only());

    store.append(&SensorId::Cpu, 95.0).unwrap();
    engine.evaluate_all_at(t0()).await;

    store.append(&SensorId::Cpu, 20.0).unwrap();
    engine.evaluate_all_at(t0() + Duration::minutes(5)).await;

    store.append(&SensorId::Cpu, 95.0).unwrap();
    let reports = engine.evaluate_all_at(t0() + Duration::minutes(10)).await;
    match &reports[0].outcome {
        Outcome::Suppressed { remaining, .. } => assert_eq!(*remaining, Duration::minutes(20)),
        other => panic!("expected suppression, got {other:?}"),
    }
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn sensor_without_samples_never_alerts() {
    let (_dir, store) = store();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut engine = engine(store.clone(), notifier.clone(), default_thresholds());

    store.append(&SensorId::Ram, 99.0).unwrap();
    let reports = engine.evaluate_all_at(t0()).await;

    let outcomes: Vec<(&SensorId, &Outcome)> =
        reports.iter().map(|r| (&r.sensor, &r.outcome)).collect();
    assert_eq!(outcomes[0], (&SensorId::Cpu, &Outcome::NoData));
    assert!(matches!(outcomes[1], (SensorId::Ram, Outcome::Alerted { .. })));
    assert_eq!(outcomes[2], (&SensorId::Disk, &Outcome::NoData));
    assert_eq!(notifier.count(), 1);
    assert_eq!(engine.last_alert_at(&SensorId::Cpu), None);
}

#[tokio::test]
async fn unreachable_store_is_treated_as_no_data() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut engine = engine(Arc::new(UnreachableStore), notifier.clone(), default_thresholds());

    let reports = engine.evaluate_all_at(t0()).await;
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.outcome == Outcome::NoData));
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn failed_delivery_still_consumes_cooldown() {
    let (_dir, store) = store();
    let notifier = Arc::new(RecordingNotifier::failing());
    let mut engine = engine(store.clone(), notifier.clone(), cpu_only());

    store.append(&SensorId::Cpu, 99.0).unwrap();
    let reports = engine.evaluate_all_at(t0()).await;
    match &reports[0].outcome {
        Outcome::NotifyFailed { error, .. } => assert!(error.contains("connection refused")),
        other => panic!("expected delivery failure, got {other:?}"),
    }
    assert!(reports[0].outcome.attempted());

    let reports = engine.evaluate_all_at(t0() + Duration::minutes(1)).await;
    assert!(matches!(reports[0].outcome, Outcome::Suppressed { .. }));
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn failure_on_one_sensor_does_not_stop_the_pass() {
    let (_dir, store) = store();
    let notifier = Arc::new(RecordingNotifier::failing());
    let mut engine = engine(store.clone(), notifier.clone(), default_thresholds());

    store.append(&SensorId::Cpu, 99.0).unwrap();
    store.append(&SensorId::Ram, 99.0).unwrap();
    store.append(&SensorId::Disk, 99.0).unwrap();

    let reports = engine.evaluate_all_at(t0()).await;
    assert_eq!(reports.len(), 3);
    assert!(reports
        .iter()
        .all(|r| matches!(r.outcome, Outcome::NotifyFailed { .. })));
    assert_eq!(notifier.count(), 3);
}

#[tokio::test]
async fn sensors_cool_down_independently() {
    let (_dir, store) = store();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut engine = engine(store.clone(), notifier.clone(), default_thresholds());

    store.append(&SensorId::Cpu, 90.0).unwrap();
    engine.evaluate_all_at(t0()).await;

    store.append(&SensorId::Disk, 95.0).unwrap();
    let reports = engine.evaluate_all_at(t0() + Duration::minutes(5)).await;
    assert!(matches!(reports[0].outcome, Outcome::Suppressed { .. }));
    assert!(matches!(reports[2].outcome, Outcome::Alerted { .. }));
    assert_eq!(notifier.count(), 2);
}

#[tokio::test]
async fn hanging_notifier_times_out() {
    let (_dir, store) = store();
    let mut engine = engine(store.clone(), Arc::new(HangingNotifier), cpu_only())
        .with_notify_timeout(std::time::Duration::from_millis(50));

    store.append(&SensorId::Cpu, 99.0).unwrap();
    let reports = engine.evaluate_all_at(t0()).await;
    match &reports[0].outcome {
        Outcome::NotifyFailed { error, .. } => assert!(error.contains("hanging")),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(engine.last_alert_at(&SensorId::Cpu).is_some());
}

#[tokio::test]
async fn persisted_cooldown_survives_engine_restart() {
    let (_dir, store) = store();
    let cooldowns = Arc::new(MemoryCooldowns::default());
    store.append(&SensorId::Cpu, 99.0).unwrap();

    let first_notifier = Arc::new(RecordingNotifier::default());
    let mut first = engine(store.clone(), first_notifier.clone(), cpu_only())
        .with_cooldown_store(cooldowns.clone());
    first.evaluate_all_at(t0()).await;
    assert_eq!(first_notifier.count(), 1);
    drop(first);

    let second_notifier = Arc::new(RecordingNotifier::default());
    let mut second = engine(store.clone(), second_notifier.clone(), cpu_only())
        .with_cooldown_store(cooldowns.clone());
    let reports = second.evaluate_all_at(t0() + Duration::minutes(2)).await;
    assert!(matches!(reports[0].outcome, Outcome::Suppressed { .. }));
    assert_eq!(second_notifier.count(), 0);
}

#[tokio::test]
async fn in_memory_cooldown_is_lost_on_restart() {
    let (_dir, store) = store();
    store.append(&SensorId::Cpu, 99.0).unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let mut first = engine(store.clone(), notifier.clone(), cpu_only());
    first.evaluate_all_at(t0()).await;
    drop(first);

    let mut second = engine(store.clone(), notifier.clone(), cpu_only());
    second.evaluate_all_at(t0() + Duration::minutes(2)).await;
    assert_eq!(notifier.count(), 2);
}

#[tokio::test]
async fn sqlite_cooldown_store_round_trips_through_engine() {
    let (_dir, store) = store();
    store.append(&SensorId::Ram, 97.0).unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let mut engine = engine(store.clone(), notifier.clone(), default_thresholds())
        .with_cooldown_store(store.clone());
    engine.evaluate_all_at(t0()).await;

    let recorded = store.load_cooldowns().unwrap();
    assert_eq!(recorded.get(&SensorId::Ram), Some(&t0()));
    assert!(!recorded.contains_key(&SensorId::Cpu));
}

#[tokio::test]
async fn notification_names_sensor_value_threshold_and_time() {
    let (_dir, store) = store();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut engine = engine(
        store.clone(),
        notifier.clone(),
        vec![SensorThreshold::new(SensorId::Disk, 85.0)],
    );

    let captured = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 59, 58)
        .unwrap();
    store.append_at(&SensorId::Disk, 91.5, captured).unwrap();
    engine.evaluate_all_at(t0()).await;

    let (subject, body) = notifier.last();
    assert!(subject.contains("Disk"));
    assert!(subject.contains("91.5"));
    assert!(body.contains("Sensor: disk"));
    assert!(body.contains("91.5%"));
    assert!(body.contains("threshold: 85.0%"));
    assert!(body.contains("2024-03-01 08:59:58"));
}

#[test]
fn custom_sensor_message_is_generic() {
    let msg = AlertMessage::render(
        &SensorId::from("gpu"),
        77.0,
        70.0,
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        t0(),
    );
    assert!(msg.subject.contains("Sensor 'gpu'"));
    assert!(msg.body.contains("Sensor: gpu"));
    assert!(msg.body.contains("threshold: 70.0%"));
}
