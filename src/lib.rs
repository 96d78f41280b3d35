pub mod config;
pub mod error;
pub mod kernel;
pub mod memory;
pub mod persistence;
pub mod scoring;

// Re-export specific items for convenient access
pub use config::EngineConfig;
pub use error::{KnowledgeError, KnowledgeResult};
pub use kernel::engine::{LearnOutcome, Learned, LearningEngine, LoadOutcome};
pub use kernel::scheduler::{MaintenanceScheduler, MaintenanceTask, SchedulerState};
