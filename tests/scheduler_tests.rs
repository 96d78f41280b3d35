use chrono::Utc;
use lorekeeper::config::MAX_MAINTENANCE_SECS;
use lorekeeper::kernel::state::{SharedState, StateHandle};
use lorekeeper::memory::Knowledge;
use lorekeeper::persistence::{JsonFileCodec, PersistenceCodec, Snapshot};
use lorekeeper::{KnowledgeError, KnowledgeResult, MaintenanceScheduler, MaintenanceTask, SchedulerState};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn knowledge(content: &str) -> Knowledge {
    Knowledge {
        content: content.to_string(),
        category: "test".to_string(),
        confidence: 0.5,
        timestamp: Utc::now(),
        connections: BTreeSet::new(),
        metadata: BTreeMap::new(),
    }
}

fn state_with(contents: &[&str]) -> StateHandle {
    let mut state = SharedState::new(16);
    for c in contents {
        state.record_learning(knowledge(c)).unwrap();
    }
    state.into_handle()
}

/// Every save fails.
#[derive(Default)]
struct FailingCodec {
    calls: AtomicUsize,
}

impl PersistenceCodec for FailingCodec {
    fn save(&self, _snapshot: &Snapshot, _destination: &Path) -> KnowledgeResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(KnowledgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
    }

    fn load(&self, source: &Path) -> KnowledgeResult<Snapshot> {
        Err(KnowledgeError::NotFound(source.to_path_buf()))
    }
}

/// Save takes a while and records when it starts and ends.
#[derive(Default)]
struct SlowCodec {
    started: AtomicBool,
    finished: AtomicBool,
}

impl PersistenceCodec for SlowCodec {
    fn save(&self, _snapshot: &Snapshot, _destination: &Path) -> KnowledgeResult<()> {
        self.started.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(200));
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, source: &Path) -> KnowledgeResult<Snapshot> {
        Err(KnowledgeError::NotFound(source.to_path_buf()))
    }
}

async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[test]
fn test_zero_period_rejected() {
    assert!(matches!(
        MaintenanceScheduler::new(Duration::ZERO),
        Err(KnowledgeError::Config(_))
    ));
}

#[test]
fn test_period_upper_bound() {
    assert!(matches!(
        MaintenanceScheduler::new(Duration::from_secs(u64::MAX)),
        Err(KnowledgeError::Config(_))
    ));
    assert!(MaintenanceScheduler::new(Duration::from_secs(MAX_MAINTENANCE_SECS)).is_ok());
}

#[tokio::test]
async fn test_pass_dedups_then_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let state = state_with(&["same", "same", "other"]);
    let task = MaintenanceTask::new(state.clone(), Arc::new(JsonFileCodec), path.clone());

    let report = task.run_once().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.persisted, 2);

    let saved = JsonFileCodec.load(&path).unwrap();
    assert_eq!(saved.knowledge.len(), 2);
    assert_eq!(saved.history.len(), 3, "history survives dedup");
    assert_eq!(state.lock().await.store.len(), 2);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let task = MaintenanceTask::new(state_with(&[]), Arc::new(JsonFileCodec), dir.path().join("s.json"));
    let mut scheduler = MaintenanceScheduler::new(Duration::from_secs(3600)).unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(scheduler.start(task.clone()));
    assert!(!scheduler.start(task), "second start must not spawn another timer");
    assert_eq!(scheduler.state(), SchedulerState::Running);

    assert!(scheduler.stop().await);
    assert!(!scheduler.stop().await);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn test_first_pass_waits_one_period() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.json");
    let task = MaintenanceTask::new(state_with(&["a"]), Arc::new(JsonFileCodec), path.clone());
    let mut scheduler = MaintenanceScheduler::new(Duration::from_secs(3600)).unwrap();

    scheduler.start(task);
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;

    assert_eq!(scheduler.counters().completed(), 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_ticks_run_maintenance() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.json");
    let state = state_with(&["dup", "dup"]);
    let task = MaintenanceTask::new(state.clone(), Arc::new(JsonFileCodec), path.clone());
    let mut scheduler = MaintenanceScheduler::new(Duration::from_millis(20)).unwrap();
    let counters = scheduler.counters();

    scheduler.start(task);
    assert!(wait_until(|| counters.completed() >= 2).await);
    scheduler.stop().await;

    assert!(path.exists());
    assert_eq!(state.lock().await.store.len(), 1);
    assert_eq!(counters.failed(), 0);
}

#[tokio::test]
async fn test_failed_pass_does_not_stop_loop() {
    let codec = Arc::new(FailingCodec::default());
    let task = MaintenanceTask::new(state_with(&["x"]), codec.clone(), "unused.json".into());
    let mut scheduler = MaintenanceScheduler::new(Duration::from_millis(20)).unwrap();
    let counters = scheduler.counters();

    scheduler.start(task);
    assert!(wait_until(|| counters.failed() >= 3).await, "loop keeps ticking after failures");
    assert_eq!(scheduler.state(), SchedulerState::Running);
    scheduler.stop().await;

    assert_eq!(counters.completed(), 0);
    assert!(codec.calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_stop_lets_inflight_pass_finish() {
    let codec = Arc::new(SlowCodec::default());
    let task = MaintenanceTask::new(state_with(&["x"]), codec.clone(), "unused.json".into());
    let mut scheduler = MaintenanceScheduler::new(Duration::from_millis(10)).unwrap();

    scheduler.start(task);
    assert!(wait_until(|| codec.started.load(Ordering::SeqCst)).await);
    scheduler.stop().await;

    assert!(codec.finished.load(Ordering::SeqCst), "stop must not cut a pass short");
    assert_eq!(scheduler.counters().completed(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_learns_never_half_captured() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let state = state_with(&["dup", "dup"]);
    let task = MaintenanceTask::new(state.clone(), Arc::new(JsonFileCodec), path.clone());

    let learners = async {
        let mut handles = Vec::new();
        for i in 0..32 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                state.lock().await.record_learning(knowledge(&format!("fact {}", i))).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    };
    let (_, report) = tokio::join!(learners, task.run_once());
    let report = report.unwrap();

    // Every learn is either fully in the snapshot (record + history) or absent.
    let saved = JsonFileCodec.load(&path).unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(saved.knowledge.len(), report.persisted);
    assert_eq!(saved.history.len(), saved.knowledge.len() + 1);

    let guard = state.lock().await;
    for entry in &saved.knowledge {
        assert_eq!(guard.store.get(&entry.key), Some(&entry.knowledge));
    }
    assert_eq!(guard.store.len(), 33);
    assert_eq!(guard.history.len(), 34);
}
