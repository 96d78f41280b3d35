use crate::memory::types::HistoryEntry;
use chrono::{DateTime, Utc};

/// Append-only learning history. Entries are never removed or rewritten,
/// and there is no retention cap.
#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from persisted entries, keeping their order.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn append(&mut self, timestamp: DateTime<Utc>, category: &str, confidence: f64) {
        self.entries.push(HistoryEntry {
            timestamp,
            category: category.to_string(),
            confidence,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}
