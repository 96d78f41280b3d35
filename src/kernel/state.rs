use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::KnowledgeResult;
use crate::memory::{HistoryLog, Knowledge, KnowledgeKey, KnowledgeStore, RecentBuffer, RecentItem};
use crate::persistence::Snapshot;

/// Everything the engine mutates. Always accessed through one lock, so a
/// reader never sees a half-applied learn, dedup, or restore.
#[derive(Debug)]
pub struct SharedState {
    pub store: KnowledgeStore,
    pub history: HistoryLog,
    pub recent: RecentBuffer,
}

pub type StateHandle = Arc<Mutex<SharedState>>;

impl SharedState {
    pub fn new(max_memory: usize) -> Self {
        Self {
            store: KnowledgeStore::new(),
            history: HistoryLog::new(),
            recent: RecentBuffer::new(max_memory),
        }
    }

    pub fn into_handle(self) -> StateHandle {
        Arc::new(Mutex::new(self))
    }

    /// The learn path: store the record, then log the event.
    /// Nothing is logged if the store rejects the record.
    pub fn record_learning(&mut self, knowledge: Knowledge) -> KnowledgeResult<KnowledgeKey> {
        let timestamp = knowledge.timestamp;
        let category = knowledge.category.clone();
        let confidence = knowledge.confidence;
        let content = knowledge.content.clone();

        let key = self.store.insert(knowledge)?;
        self.history.append(timestamp, &category, confidence);
        self.recent.record(RecentItem {
            key: key.clone(),
            category,
            content,
            timestamp,
        });
        Ok(key)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            knowledge: self.store.entries().to_vec(),
            history: self.history.entries().to_vec(),
        }
    }

    /// Replaces store and history with a loaded snapshot.
    /// The new store is built first; on error the current state is untouched.
    pub fn restore(&mut self, snapshot: Snapshot) -> KnowledgeResult<()> {
        let mut store = KnowledgeStore::new();
        for entry in snapshot.knowledge {
            store.insert_with_key(entry.key, entry.knowledge)?;
        }
        self.store = store;
        self.history = HistoryLog::from_entries(snapshot.history);
        self.recent.clear();
        Ok(())
    }
}
