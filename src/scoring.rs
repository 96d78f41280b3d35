use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Result of scoring one raw input.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Expected in [0.0, 1.0]. The store rejects anything else.
    pub confidence: f64,
    /// Extracted features, stored as the record's metadata.
    pub features: BTreeMap<String, Value>,
}

/// Pluggable feature extraction + confidence scoring.
/// The engine only relies on this contract, never on a concrete scorer.
pub trait ScoringStrategy: Send + Sync {
    fn assess(&self, content: &str, raw: &Value) -> Assessment;
}

/// Renders a raw input to the text stored as `Knowledge::content`.
/// Strings are kept bare, everything else is compact JSON.
pub fn render_content(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const WORDS_FOR_FULL_CONFIDENCE: f64 = 100.0;

/// Default scorer: confidence grows with word count, saturating at 100 words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCountScorer;

impl ScoringStrategy for WordCountScorer {
    fn assess(&self, content: &str, raw: &Value) -> Assessment {
        let word_count = content.split_whitespace().count();
        let confidence = (word_count as f64 / WORDS_FOR_FULL_CONFIDENCE).min(1.0);

        let mut features = BTreeMap::new();
        features.insert("length".to_string(), json!(content.chars().count()));
        features.insert("word_count".to_string(), json!(word_count));
        features.insert("input_kind".to_string(), json!(kind_of(raw)));

        Assessment { confidence, features }
    }
}

fn kind_of(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
