use crate::memory::types::Knowledge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_knowledge: usize,
    pub categories: BTreeMap<String, usize>,
    pub average_confidence: f64,
    /// Length of the history log, not the store size.
    pub learning_sessions: usize,
}

pub fn compute_stats<'a, I>(records: I, learning_sessions: usize) -> StoreStats
where
    I: IntoIterator<Item = &'a Knowledge>,
{
    let mut stats = StoreStats { learning_sessions, ..Default::default() };
    let mut confidence_sum = 0.0;

    for record in records {
        stats.total_knowledge += 1;
        *stats.categories.entry(record.category.clone()).or_insert(0) += 1;
        confidence_sum += record.confidence;
    }

    // Empty store averages to zero
    if stats.total_knowledge > 0 {
        stats.average_confidence = confidence_sum / stats.total_knowledge as f64;
    }

    stats
}
