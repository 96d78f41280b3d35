//! State file codec.
//!
//! Layout (pretty JSON):
//! ```text
//! { "timestamp": ..., "knowledge_base": { key: record, ... },
//!   "learning_history": [ ... ], "stats": { ... } }
//! ```
//! `stats` is informational. It is written on save and ignored on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::memory::{
    compute_stats, is_valid_confidence, HistoryEntry, Knowledge, StoreStats, StoredKnowledge,
};

/// Point-in-time copy of store + history, taken under the state lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Insertion order.
    pub knowledge: Vec<StoredKnowledge>,
    pub history: Vec<HistoryEntry>,
}

impl Snapshot {
    pub fn stats(&self) -> StoreStats {
        compute_stats(self.knowledge.iter().map(|e| &e.knowledge), self.history.len())
    }
}

/// Boundary between the engine and durable storage.
pub trait PersistenceCodec: Send + Sync {
    fn save(&self, snapshot: &Snapshot, destination: &Path) -> KnowledgeResult<()>;

    /// `NotFound` when `source` is absent, `CorruptState` when it does not parse.
    fn load(&self, source: &Path) -> KnowledgeResult<Snapshot>;
}

#[derive(Serialize)]
struct PersistedStateRef<'a> {
    timestamp: DateTime<Utc>,
    #[serde(serialize_with = "ordered_knowledge")]
    knowledge_base: &'a [StoredKnowledge],
    learning_history: &'a [HistoryEntry],
    stats: StoreStats,
}

fn ordered_knowledge<S: Serializer>(entries: &&[StoredKnowledge], s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(entries.iter().map(|e| (&e.key, &e.knowledge)))
}

#[derive(Deserialize)]
struct PersistedState {
    /// Required for the layout to be valid. The value itself is not used.
    #[serde(rename = "timestamp")]
    _saved_at: DateTime<Utc>,
    knowledge_base: BTreeMap<String, Knowledge>,
    learning_history: Vec<HistoryEntry>,
}

/// JSON state file, written atomically (temp file + rename).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileCodec;

impl PersistenceCodec for JsonFileCodec {
    fn save(&self, snapshot: &Snapshot, destination: &Path) -> KnowledgeResult<()> {
        let doc = PersistedStateRef {
            timestamp: Utc::now(),
            knowledge_base: &snapshot.knowledge,
            learning_history: &snapshot.history,
            stats: snapshot.stats(),
        };
        let json = serde_json::to_string_pretty(&doc).map_err(encode_error)?;
        atomic_write_text(destination, &json)?;
        debug!(
            "Saved {} records, {} history entries to {}",
            snapshot.knowledge.len(),
            snapshot.history.len(),
            destination.display()
        );
        Ok(())
    }

    fn load(&self, source: &Path) -> KnowledgeResult<Snapshot> {
        let contents = match fs::read_to_string(source) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KnowledgeError::NotFound(source.to_path_buf()))
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(KnowledgeError::CorruptState(e.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let state: PersistedState = serde_json::from_str(&contents)
            .map_err(|e| KnowledgeError::CorruptState(e.to_string()))?;

        decode_state(state)
    }
}

/// A document that cannot be encoded is a failed write, not a corrupt input.
fn encode_error(e: serde_json::Error) -> KnowledgeError {
    KnowledgeError::Io(std::io::Error::new(ErrorKind::InvalidData, e))
}

fn decode_state(state: PersistedState) -> KnowledgeResult<Snapshot> {
    for (key, record) in &state.knowledge_base {
        if !is_valid_confidence(record.confidence) {
            return Err(KnowledgeError::CorruptState(format!(
                "record {} has confidence {}",
                key, record.confidence
            )));
        }
    }
    if let Some(bad) = state.learning_history.iter().find(|h| !is_valid_confidence(h.confidence)) {
        return Err(KnowledgeError::CorruptState(format!(
            "history entry at {} has confidence {}",
            bad.timestamp, bad.confidence
        )));
    }

    // JSON objects carry no order; creation time recovers insertion order.
    let mut knowledge: Vec<StoredKnowledge> = state
        .knowledge_base
        .into_iter()
        .map(|(key, knowledge)| StoredKnowledge { key, knowledge })
        .collect();
    knowledge.sort_by(|a, b| {
        a.knowledge
            .timestamp
            .cmp(&b.knowledge.timestamp)
            .then_with(|| a.key.cmp(&b.key))
    });

    Ok(Snapshot { knowledge, history: state.learning_history })
}

/// Write text content atomically:
/// create the parent directory, write a temp file beside the target,
/// fsync it, then rename it into place.
fn atomic_write_text(path: &Path, content: &str) -> KnowledgeResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("state.json");
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = (|| -> std::io::Result<()> {
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
