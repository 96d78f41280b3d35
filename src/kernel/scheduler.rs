use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::StateHandle;
use crate::config::MAX_MAINTENANCE_SECS;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::persistence::PersistenceCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub removed: usize,
    pub persisted: usize,
}

#[derive(Debug, Default)]
pub struct PassCounters {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl PassCounters {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

/// One maintenance pass: dedup, then persist.
#[derive(Clone)]
pub struct MaintenanceTask {
    state: StateHandle,
    codec: Arc<dyn PersistenceCodec>,
    destination: PathBuf,
}

impl MaintenanceTask {
    pub fn new(state: StateHandle, codec: Arc<dyn PersistenceCodec>, destination: PathBuf) -> Self {
        Self { state, codec, destination }
    }

    /// Dedup and snapshot happen under a single lock acquisition, so no
    /// learn can land between them. Serialization runs outside the lock.
    pub async fn run_once(&self) -> KnowledgeResult<MaintenanceReport> {
        let (removed, snapshot) = {
            let mut state = self.state.lock().await;
            let removed = state.store.deduplicate();
            (removed, state.snapshot())
        };
        let persisted = snapshot.knowledge.len();

        let codec = Arc::clone(&self.codec);
        let destination = self.destination.clone();
        run_blocking(move || codec.save(&snapshot, &destination)).await?;

        Ok(MaintenanceReport { removed, persisted })
    }
}

/// Runs file I/O off the async workers. A panicked closure surfaces as `Io`.
pub(crate) async fn run_blocking<T, F>(f: F) -> KnowledgeResult<T>
where
    F: FnOnce() -> KnowledgeResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| KnowledgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
}

/// Drives `MaintenanceTask` on a fixed period.
///
/// Cancellation is only observed between passes; a pass that has started
/// always runs to completion.
pub struct MaintenanceScheduler {
    period: Duration,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<PassCounters>,
}

impl MaintenanceScheduler {
    pub fn new(period: Duration) -> KnowledgeResult<Self> {
        if period.is_zero() {
            return Err(KnowledgeError::Config("maintenance period must be positive".to_string()));
        }
        if period > Duration::from_secs(MAX_MAINTENANCE_SECS) {
            return Err(KnowledgeError::Config(format!(
                "maintenance period {:?} exceeds the maximum of {}s",
                period, MAX_MAINTENANCE_SECS
            )));
        }
        Ok(Self {
            period,
            cancel: None,
            handle: None,
            counters: Arc::new(PassCounters::default()),
        })
    }

    /// `Running` only while the loop task is alive.
    pub fn state(&self) -> SchedulerState {
        match &self.handle {
            Some(handle) if !handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn counters(&self) -> Arc<PassCounters> {
        Arc::clone(&self.counters)
    }

    /// Stopped -> Running. Returns false (and spawns nothing) if already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, task: MaintenanceTask) -> bool {
        if self.state() == SchedulerState::Running {
            debug!("Maintenance scheduler already running");
            return false;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = self.period;
        let counters = Arc::clone(&self.counters);

        let handle = tokio::spawn(async move {
            // First pass one full period after start.
            let mut cadence = interval_at(Instant::now() + period, period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = cadence.tick() => {
                        match task.run_once().await {
                            Ok(report) => {
                                counters.completed.fetch_add(1, Ordering::SeqCst);
                                info!(
                                    "Maintenance pass: removed {} duplicates, persisted {} records",
                                    report.removed, report.persisted
                                );
                            }
                            Err(e) => {
                                counters.failed.fetch_add(1, Ordering::SeqCst);
                                error!("Maintenance pass failed, retrying next tick: {}", e);
                            }
                        }
                    }
                }
            }
            debug!("Maintenance loop exited");
        });

        self.cancel = Some(token);
        self.handle = Some(handle);
        info!("Maintenance scheduler started. Period: {:?}", period);
        true
    }

    /// Running -> Stopped. Waits for an in-flight pass to finish.
    /// Returns false if it was not running.
    pub async fn stop(&mut self) -> bool {
        let Some(token) = self.cancel.take() else {
            return false;
        };
        token.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Maintenance task ended abnormally: {}", e);
            }
        }
        info!("Maintenance scheduler stopped");
        true
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        if let Some(token) = &self.cancel {
            token.cancel();
        }
    }
}
