use crate::error::{KnowledgeError, KnowledgeResult};
use crate::memory::stats::{compute_stats, StoreStats};
use crate::memory::types::{is_valid_confidence, make_key, Knowledge, KnowledgeKey};
use std::collections::HashMap;
use tracing::debug;

/// A record together with the key it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredKnowledge {
    pub key: KnowledgeKey,
    pub knowledge: Knowledge,
}

/// Key -> Knowledge mapping that remembers insertion order.
///
/// Insertion order matters: the dedup tie-break keeps the later record.
#[derive(Debug, Default, Clone)]
pub struct KnowledgeStore {
    entries: Vec<StoredKnowledge>,
    index: HashMap<KnowledgeKey, usize>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.index.insert(entry.key.clone(), i);
        }
    }

    /// Stores a freshly learned record and returns its key.
    ///
    /// The key is `category:timestamp`. Two inserts landing on the same key
    /// get a `#n` suffix instead of overwriting each other.
    pub fn insert(&mut self, knowledge: Knowledge) -> KnowledgeResult<KnowledgeKey> {
        if !is_valid_confidence(knowledge.confidence) {
            return Err(KnowledgeError::InvalidConfidence(knowledge.confidence));
        }

        let base = make_key(&knowledge.category, &knowledge.timestamp);
        let mut key = base.clone();
        let mut suffix = 2u32;
        while self.index.contains_key(&key) {
            key = format!("{}#{}", base, suffix);
            suffix += 1;
        }
        if suffix > 2 {
            debug!("Key collision on {}, stored as {}", base, key);
        }

        self.index.insert(key.clone(), self.entries.len());
        self.entries.push(StoredKnowledge { key: key.clone(), knowledge });
        Ok(key)
    }

    /// Stores under an explicit key. An existing record with that key is
    /// overwritten in place (last write wins).
    pub fn insert_with_key(&mut self, key: KnowledgeKey, knowledge: Knowledge) -> KnowledgeResult<()> {
        if !is_valid_confidence(knowledge.confidence) {
            return Err(KnowledgeError::InvalidConfidence(knowledge.confidence));
        }

        match self.index.get(&key) {
            Some(&i) => self.entries[i].knowledge = knowledge,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(StoredKnowledge { key, knowledge });
            }
        }
        Ok(())
    }

    /// All records of `category` with confidence >= `threshold`.
    /// Callers must not rely on the order.
    pub fn query(&self, category: &str, threshold: f64) -> Vec<Knowledge> {
        self.entries
            .iter()
            .filter(|e| e.knowledge.category == category && e.knowledge.confidence >= threshold)
            .map(|e| e.knowledge.clone())
            .collect()
    }

    /// Collapses records with identical content down to one.
    ///
    /// The survivor has the highest confidence; on a tie the later-inserted
    /// record wins. Single scan, O(n). Returns how many records were removed.
    pub fn deduplicate(&mut self) -> usize {
        let mut keep = vec![true; self.entries.len()];
        {
            // content -> index of the current survivor
            let mut best: HashMap<&str, usize> = HashMap::new();
            for (i, entry) in self.entries.iter().enumerate() {
                let content = entry.knowledge.content.as_str();
                match best.get(content).copied() {
                    None => {
                        best.insert(content, i);
                    }
                    Some(j) => {
                        if self.entries[j].knowledge.confidence <= entry.knowledge.confidence {
                            keep[j] = false;
                            best.insert(content, i);
                        } else {
                            keep[i] = false;
                        }
                    }
                }
            }
        }

        let before = self.entries.len();
        let mut flags = keep.into_iter();
        self.entries.retain(|_| flags.next().unwrap_or(true));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    pub fn stats(&self, learning_sessions: usize) -> StoreStats {
        compute_stats(self.entries.iter().map(|e| &e.knowledge), learning_sessions)
    }

    pub fn get(&self, key: &str) -> Option<&Knowledge> {
        self.index.get(key).and_then(|&i| self.entries.get(i)).map(|e| &e.knowledge)
    }

    pub fn keys(&self) -> impl Iterator<Item = &KnowledgeKey> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Insertion-ordered view, used for snapshots.
    pub fn entries(&self) -> &[StoredKnowledge] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
