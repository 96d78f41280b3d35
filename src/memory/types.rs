use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub type KnowledgeKey = String;

/// A single learned fact. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    pub content: String,
    pub category: String,
    pub confidence: f64, // 0.0 - 1.0
    pub timestamp: DateTime<Utc>,
    /// Forward pointers to other keys. May dangle.
    #[serde(default)]
    pub connections: BTreeSet<KnowledgeKey>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// One learning event. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub confidence: f64,
}

/// `category:timestamp`, timestamp in RFC 3339 with microseconds.
pub fn make_key(category: &str, timestamp: &DateTime<Utc>) -> KnowledgeKey {
    format!("{}:{}", category, timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
}

pub fn is_valid_confidence(confidence: f64) -> bool {
    (0.0..=1.0).contains(&confidence)
}
