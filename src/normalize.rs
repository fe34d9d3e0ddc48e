//! Coerces loosely shaped model records into bounded [`StoryItem`]s.

use serde_json::Value;
use thiserror::Error;

use crate::models::{StoryItem, OPTION_MAX_CHARS, QUESTION_MAX_CHARS, STORY_MAX_CHARS, TITLE_MAX_CHARS};

const DEFAULT_TITLE: &str = "Financial Lesson";
const DEFAULT_QUESTION: &str = "What is the best choice?";
const DEFAULT_OPTIONS: [&str; 2] = ["Option A", "Option B"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("required field `{0}` is empty after normalization")]
    EmptyField(&'static str),
    #[error("option {0} marked correct was dropped during normalization")]
    CorrectOptionDropped(usize),
}

/// Scalar JSON values as text; containers and null have no text form.
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Truncates by characters so multi-byte scripts are never split.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn bounded(s: &str, max: usize) -> String {
    truncate_chars(s.trim(), max).trim_end().to_string()
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    option_count: usize,
}

/// Normalized items plus how many slots had to be filled with fallback content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBatch {
    pub items: Vec<StoryItem>,
    pub rejected: usize,
    pub padded: usize,
}

impl Normalizer {
    pub fn new(option_count: usize) -> Self {
        Self { option_count: option_count.max(2) }
    }

    pub fn normalize(&self, record: &Value) -> Result<StoryItem, ValidationFailure> {
        let obj = record.as_object().ok_or(ValidationFailure::NotAnObject)?;
        let field = |key: &str, default: &str, max: usize| {
            let raw = obj
                .get(key)
                .and_then(coerce_text)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string());
            bounded(&raw, max)
        };

        let title = field("title", DEFAULT_TITLE, TITLE_MAX_CHARS);
        let story = field("story", "", STORY_MAX_CHARS);
        let question = field("question", DEFAULT_QUESTION, QUESTION_MAX_CHARS);
        for (name, value) in [("title", &title), ("story", &story), ("question", &question)] {
            if value.is_empty() {
                return Err(ValidationFailure::EmptyField(name));
            }
        }

        let entries = obj.get("options").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
        let kept = self.options(entries);
        if kept.len() < 2 {
            let options = DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect();
            return Ok(StoryItem { title, story, question, options, correct: 0 });
        }

        // `correct` names a position in the raw list; follow it to where that entry landed.
        let correct = match marked_index(obj.get("correct"), entries.len()) {
            Some(original) => kept
                .iter()
                .position(|(i, _)| *i == original)
                .ok_or(ValidationFailure::CorrectOptionDropped(original))?,
            None => 0,
        };
        let options = kept.into_iter().map(|(_, o)| o).collect();

        Ok(StoryItem { title, story, question, options, correct })
    }

    /// Usable options paired with their index in the raw list.
    fn options(&self, entries: &[Value]) -> Vec<(usize, String)> {
        entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| coerce_text(entry).map(|o| (i, bounded(&o, OPTION_MAX_CHARS))))
            .filter(|(_, o)| !o.is_empty())
            .take(self.option_count)
            .collect()
    }

    /// Normalizes up to `expected` records. Invalid records are replaced, not
    /// merged, and a short batch is padded, both via `fallback(index)`.
    pub fn normalize_batch(
        &self,
        records: &[Value],
        expected: usize,
        fallback: impl Fn(usize) -> StoryItem,
    ) -> NormalizedBatch {
        let mut rejected = 0;
        let mut items: Vec<StoryItem> = records
            .iter()
            .take(expected)
            .enumerate()
            .map(|(i, record)| match self.normalize(record) {
                Ok(item) => item,
                Err(reason) => {
                    tracing::warn!(index = i, %reason, "⚠️ Replacing invalid story record with fallback");
                    rejected += 1;
                    fallback(i)
                }
            })
            .collect();
        let padded = expected.saturating_sub(items.len());
        for i in items.len()..expected {
            items.push(fallback(i));
        }
        NormalizedBatch { items, rejected, padded }
    }
}

/// Only in-range integers, or numerals spelling one, are accepted.
fn marked_index(raw: Option<&Value>, option_len: usize) -> Option<usize> {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_u64().map(|v| v as usize),
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    parsed.filter(|&i| i < option_len)
}
