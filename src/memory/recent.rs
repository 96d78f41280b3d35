use crate::memory::types::KnowledgeKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentItem {
    pub key: KnowledgeKey,
    pub category: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Short-lived window over the latest learned items.
/// Holds at most `capacity` items; the oldest is evicted first. Never persisted.
#[derive(Debug)]
pub struct RecentBuffer {
    buffer: VecDeque<RecentItem>,
    capacity: usize,
}

impl RecentBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn record(&mut self, item: RecentItem) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(item);
    }

    /// Oldest first.
    pub fn items(&self) -> Vec<RecentItem> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
