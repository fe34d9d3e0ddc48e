use serde::{Serialize, Deserialize};
use serde_json::Value;

pub const TITLE_MAX_CHARS: usize = 100;
pub const STORY_MAX_CHARS: usize = 1000;
pub const QUESTION_MAX_CHARS: usize = 200;
pub const OPTION_MAX_CHARS: usize = 200;

/// One narrative + comprehension question unit, as served to the UI.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoryItem {
    pub title: String,
    pub story: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

impl StoryItem {
    /// True when every field sits inside the served bounds.
    pub fn is_within_bounds(&self) -> bool {
        let len = |s: &str| s.chars().count();
        (1..=TITLE_MAX_CHARS).contains(&len(&self.title))
            && (1..=STORY_MAX_CHARS).contains(&len(&self.story))
            && (1..=QUESTION_MAX_CHARS).contains(&len(&self.question))
            && self.options.len() >= 2
            && self.options.iter().all(|o| len(o) <= OPTION_MAX_CHARS)
            && self.correct < self.options.len()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
    Tamil,
}

impl Language {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "english" => Some(Self::English),
            "hindi" => Some(Self::Hindi),
            "tamil" => Some(Self::Tamil),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Hindi => "hindi",
            Self::Tamil => "tamil",
        }
    }
}

/// How many items the caller asked for; decides the response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Many(usize),
}

impl Cardinality {
    pub fn count(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Many(n) => *n,
        }
    }
}

/// Validated, sanitized parameters for one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub language: Language,
    pub topic: String,
    pub difficulty: String,
    pub length: String,
    pub cardinality: Cardinality,
}

/// Inbound body for `/api/story`. Everything is optional; values are
/// kept loosely typed so validation can answer with our own 400s.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    #[serde(default)]
    pub language: Option<Value>,
    #[serde(default)]
    pub topic: Option<Value>,
    #[serde(default)]
    pub difficulty: Option<Value>,
    #[serde(default)]
    pub length: Option<Value>,
    #[serde(default)]
    pub num_stories: Option<Value>,
    #[serde(default)]
    pub test: Option<Value>,
    /// Nested `{ topic, difficulty, length }`; non-object values are ignored.
    #[serde(default)]
    pub options: Option<Value>,
}

impl StoryRequest {
    pub fn is_test(&self) -> bool {
        matches!(self.test, Some(Value::Bool(true)))
    }

    /// Field of the nested `options` object, when there is one.
    pub fn nested(&self, key: &str) -> Option<&Value> {
        self.options.as_ref().and_then(Value::as_object).and_then(|o| o.get(key))
    }
}

/// Response body: one object for single requests, an array otherwise.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum StoryPayload {
    Single(StoryItem),
    Many(Vec<StoryItem>),
}

impl StoryPayload {
    pub fn items(&self) -> Vec<&StoryItem> {
        match self {
            Self::Single(item) => vec![item],
            Self::Many(items) => items.iter().collect(),
        }
    }
}

/// Verdict of a connectivity probe. Always served with HTTP 200.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub message: String,
    pub api_key_present: bool,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Connected,
    Error,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CheckAnswerRequest {
    #[serde(default)]
    pub user_answer: Option<Value>,
    #[serde(default)]
    pub correct_answer: Option<Value>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckAnswerResponse {
    pub correct: bool,
    pub user_answer: i64,
    pub correct_answer: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn language_parse_is_case_insensitive() {
        assert_eq!(Language::parse(" Hindi "), Some(Language::Hindi));
        assert_eq!(Language::parse("TAMIL"), Some(Language::Tamil));
        assert_eq!(Language::parse("french"), None);
    }

    #[test]
    fn payload_serializes_by_cardinality() {
        let item = StoryItem {
            title: "T".into(),
            story: "S".into(),
            question: "Q".into(),
            options: vec!["A".into(), "B".into()],
            correct: 1,
        };
        let single = serde_json::to_value(StoryPayload::Single(item.clone())).unwrap();
        assert!(single.is_object());
        let many = serde_json::to_value(StoryPayload::Many(vec![item.clone(), item])).unwrap();
        assert_eq!(many.as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn non_object_options_are_ignored() {
        for options in [json!("x"), json!([1, 2]), json!(7)] {
            let req: StoryRequest = serde_json::from_value(json!({ "test": true, "options": options })).unwrap();
            assert!(req.is_test());
            assert_eq!(req.nested("topic"), None);
        }
        let req: StoryRequest = serde_json::from_value(json!({ "options": { "topic": "loans" } })).unwrap();
        assert_eq!(req.nested("topic"), Some(&json!("loans")));
    }

    #[test]
    fn bounds_reject_out_of_range_correct() {
        let item = StoryItem {
            title: "T".into(),
            story: "S".into(),
            question: "Q".into(),
            options: vec!["A".into(), "B".into()],
            correct: 2,
        };
        assert!(!item.is_within_bounds());
    }
}
