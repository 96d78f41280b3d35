use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::scheduler::{
    run_blocking, MaintenanceReport, MaintenanceScheduler, MaintenanceTask, PassCounters, SchedulerState,
};
use super::state::{SharedState, StateHandle};
use crate::config::EngineConfig;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::memory::{is_valid_confidence, Knowledge, KnowledgeKey, RecentItem, StoreStats};
use crate::persistence::{JsonFileCodec, PersistenceCodec, Snapshot};
use crate::scoring::{render_content, ScoringStrategy, WordCountScorer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Learned {
    pub key: KnowledgeKey,
    pub confidence: f64,
}

/// Wire shape of a learn result: `{status: "success", key, confidence}` or
/// `{status: "error", error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LearnOutcome {
    Success { key: KnowledgeKey, confidence: f64 },
    Error { error: String },
}

impl From<KnowledgeResult<Learned>> for LearnOutcome {
    fn from(result: KnowledgeResult<Learned>) -> Self {
        match result {
            Ok(l) => LearnOutcome::Success { key: l.key, confidence: l.confidence },
            Err(e) => LearnOutcome::Error { error: e.to_string() },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Restored { records: usize, history: usize },
    /// Nothing persisted yet. The store was left as it was.
    NotFound,
}

/// Public surface of the knowledge store: learn/query/stats/save/load plus
/// the background maintenance lifecycle.
pub struct LearningEngine {
    config: EngineConfig,
    state: StateHandle,
    scorer: Arc<dyn ScoringStrategy>,
    codec: Arc<dyn PersistenceCodec>,
    scheduler: MaintenanceScheduler,
    /// Set once the configured state file was read (or found absent).
    /// Until then the final save on shutdown is skipped.
    state_trusted: bool,
}

impl LearningEngine {
    pub fn new(config: EngineConfig) -> KnowledgeResult<Self> {
        Self::with_components(config, Arc::new(WordCountScorer), Arc::new(JsonFileCodec))
    }

    pub fn with_components(
        config: EngineConfig,
        scorer: Arc<dyn ScoringStrategy>,
        codec: Arc<dyn PersistenceCodec>,
    ) -> KnowledgeResult<Self> {
        config.validate()?;
        let scheduler = MaintenanceScheduler::new(config.maintenance_interval())?;
        Ok(Self {
            state: SharedState::new(config.max_memory).into_handle(),
            config,
            scorer,
            codec,
            scheduler,
            state_trusted: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates the data directory, restores the default state file if there
    /// is one, and starts the maintenance loop.
    ///
    /// A corrupt state file is returned as an error and the loop is not
    /// started, so the next maintenance pass cannot overwrite it.
    pub async fn initialize(&mut self) -> KnowledgeResult<()> {
        tokio::fs::create_dir_all(&self.config.data_dir).await?;

        match self.load(None).await? {
            LoadOutcome::Restored { records, history } => {
                info!("Restored {} records and {} history entries", records, history);
            }
            LoadOutcome::NotFound => info!("No saved state found, starting empty"),
        }
        self.state_trusted = true;

        let task = self.maintenance_task();
        self.scheduler.start(task);
        Ok(())
    }

    pub async fn learn(&self, data: Value, category: &str) -> KnowledgeResult<Learned> {
        self.learn_linked(data, category, Vec::new()).await
    }

    /// Learn with forward connections to other keys. Dangling keys are fine.
    pub async fn learn_linked(
        &self,
        data: Value,
        category: &str,
        connections: Vec<KnowledgeKey>,
    ) -> KnowledgeResult<Learned> {
        let content = render_content(&data);
        let assessment = self.scorer.assess(&content, &data);

        if !is_valid_confidence(assessment.confidence) {
            warn!("Scoring strategy produced out-of-range confidence {}", assessment.confidence);
            return Err(KnowledgeError::InvalidConfidence(assessment.confidence));
        }

        let knowledge = Knowledge {
            content,
            category: category.to_string(),
            confidence: assessment.confidence,
            timestamp: Utc::now(),
            connections: connections.into_iter().collect(),
            metadata: assessment.features,
        };

        let key = self.state.lock().await.record_learning(knowledge)?;
        debug!("Learned {} (confidence {:.3})", key, assessment.confidence);

        Ok(Learned { key, confidence: assessment.confidence })
    }

    pub async fn query(&self, category: &str, threshold: f64) -> Vec<Knowledge> {
        self.state.lock().await.store.query(category, threshold)
    }

    /// Query with the configured `confidence_threshold`.
    pub async fn query_default(&self, category: &str) -> Vec<Knowledge> {
        self.query(category, self.config.confidence_threshold).await
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        state.store.stats(state.history.len())
    }

    /// Latest learned items, oldest first. Bounded by `max_memory`.
    pub async fn recent(&self) -> Vec<RecentItem> {
        self.state.lock().await.recent.items()
    }

    pub async fn get(&self, key: &str) -> Option<Knowledge> {
        self.state.lock().await.store.get(key).cloned()
    }

    /// Drops every stored record. History is kept.
    pub async fn clear(&self) {
        self.state.lock().await.store.clear();
    }

    /// Persists a snapshot to `path`, or the configured state file.
    pub async fn save(&self, path: Option<&Path>) -> KnowledgeResult<PathBuf> {
        let destination = self.resolve(path);
        let snapshot = self.state.lock().await.snapshot();

        let codec = Arc::clone(&self.codec);
        let target = destination.clone();
        run_blocking(move || codec.save(&snapshot, &target)).await?;

        info!("Knowledge saved to {}", destination.display());
        Ok(destination)
    }

    /// Replaces the in-memory state with the file at `path` (or the
    /// configured state file). On `CorruptState` the current state is kept.
    pub async fn load(&self, path: Option<&Path>) -> KnowledgeResult<LoadOutcome> {
        let source = self.resolve(path);

        let codec = Arc::clone(&self.codec);
        let target = source.clone();
        let snapshot = match run_blocking(move || codec.load(&target)).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                debug!("Nothing to load at {}", source.display());
                return Ok(LoadOutcome::NotFound);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", source.display(), e);
                return Err(e);
            }
        };

        let records = snapshot.knowledge.len();
        let history = snapshot.history.len();
        self.state.lock().await.restore(snapshot)?;

        info!("Knowledge loaded from {}", source.display());
        Ok(LoadOutcome::Restored { records, history })
    }

    /// Runs one dedup + persist pass right now, outside the timer.
    pub async fn run_maintenance(&self) -> KnowledgeResult<MaintenanceReport> {
        self.maintenance_task().run_once().await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn maintenance_counters(&self) -> Arc<PassCounters> {
        self.scheduler.counters()
    }

    /// Starts the maintenance loop. No-op if it is already running.
    pub fn start_maintenance(&mut self) -> bool {
        let task = self.maintenance_task();
        self.scheduler.start(task)
    }

    /// Stops the maintenance loop, then writes a final snapshot.
    ///
    /// The snapshot is only written after a successful `initialize`. A state
    /// file that failed to load is left on disk as it is.
    pub async fn shutdown(&mut self) -> KnowledgeResult<()> {
        self.scheduler.stop().await;
        if self.state_trusted {
            self.save(None).await?;
        } else {
            warn!(
                "State file {} was never loaded, skipping final save",
                self.config.state_path().display()
            );
        }
        info!("Learning engine shut down");
        Ok(())
    }

    fn maintenance_task(&self) -> MaintenanceTask {
        MaintenanceTask::new(Arc::clone(&self.state), Arc::clone(&self.codec), self.config.state_path())
    }

    fn resolve(&self, path: Option<&Path>) -> PathBuf {
        path.map(Path::to_path_buf).unwrap_or_else(|| self.config.state_path())
    }
}
