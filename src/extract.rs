//! Recovers JSON story records from free-form model output.
//!
//! Strategies run in a fixed order and the first one that yields at least one
//! object wins. A strategy that cannot parse simply passes; running out of
//! strategies is reported as [`Extraction::NotFound`], which the pipeline
//! treats as a cue for fallback content rather than an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::Cardinality;

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Recovered { strategy: &'static str, records: Vec<Value> },
    NotFound,
}

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// Parsed JSON value, if this strategy finds one in `text`.
    fn attempt(&self, text: &str) -> Option<Value>;
}

/// The whole (trimmed) text is JSON.
pub struct WholeText;

/// First fenced code block (optionally tagged `json`) that holds an object.
pub struct FencedBlock;

/// Span from the first `{` to the last `}`.
pub struct BraceSpan;

/// Span from the first `[` to the last `]`.
pub struct BracketSpan;

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?i:json)?\s*(\{.*?\})\s*```").expect("fence pattern is valid"));

impl ExtractionStrategy for WholeText {
    fn name(&self) -> &'static str {
        "whole_text"
    }

    fn attempt(&self, text: &str) -> Option<Value> {
        serde_json::from_str(text.trim()).ok()
    }
}

impl ExtractionStrategy for FencedBlock {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn attempt(&self, text: &str) -> Option<Value> {
        FENCE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| serde_json::from_str(m.as_str()).ok())
    }
}

impl ExtractionStrategy for BraceSpan {
    fn name(&self) -> &'static str {
        "brace_span"
    }

    fn attempt(&self, text: &str) -> Option<Value> {
        span_between(text, '{', '}')
    }
}

impl ExtractionStrategy for BracketSpan {
    fn name(&self) -> &'static str {
        "bracket_span"
    }

    fn attempt(&self, text: &str) -> Option<Value> {
        span_between(text, '[', ']').filter(Value::is_array)
    }
}

fn span_between(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

const STORY_KEYS: [&str; 3] = ["title", "story", "question"];

/// An object carrying at least one story field. Anything else (a provider
/// envelope, a stray `{"a": 1}`) is not a record.
fn is_story_record(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| STORY_KEYS.iter().any(|k| obj.contains_key(*k)))
}

/// Story records carried by `value`, shaped for the requested cardinality.
fn records_from(value: Value, cardinality: Cardinality) -> Option<Vec<Value>> {
    let records: Vec<Value> = match value {
        Value::Array(items) => items.into_iter().filter(is_story_record).collect(),
        obj if is_story_record(&obj) => vec![obj],
        _ => return None,
    };
    match (records.is_empty(), cardinality) {
        (true, _) => None,
        (false, Cardinality::Single) => records.into_iter().next().map(|r| vec![r]),
        (false, Cardinality::Many(_)) => Some(records),
    }
}

pub struct ResponseExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new(vec![Box::new(WholeText), Box::new(FencedBlock), Box::new(BraceSpan), Box::new(BracketSpan)])
    }
}

impl ResponseExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, raw: &str, cardinality: Cardinality) -> Extraction {
        for strategy in &self.strategies {
            if let Some(records) = strategy.attempt(raw).and_then(|v| records_from(v, cardinality)) {
                tracing::debug!(strategy = strategy.name(), records = records.len(), "Extracted story records");
                return Extraction::Recovered { strategy: strategy.name(), records };
            }
        }
        Extraction::NotFound
    }
}
