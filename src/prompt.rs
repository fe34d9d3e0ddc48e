//! Request validation and prompt construction. Pure; no I/O.

use serde_json::Value;

use crate::{
    config::AppConfig,
    error::ApiError,
    models::{Cardinality, GenerationRequest, Language, StoryRequest},
    normalize::coerce_text,
};

pub const DEFAULT_TOPIC: &str = "saving money";
pub const TOPIC_MAX_CHARS: usize = 100;
const LABEL_MAX_CHARS: usize = 20;

/// Strips `< > " '`, trims, and caps at `max` characters. Applying it
/// twice gives the same result as applying it once.
pub fn sanitize_text(raw: &str, max: usize) -> String {
    let stripped: String = raw.chars().filter(|c| !matches!(c, '<' | '>' | '"' | '\'')).collect();
    let capped: String = stripped.trim().chars().take(max).collect();
    capped.trim_end().to_string()
}

pub fn sanitize_topic(raw: &str) -> String {
    sanitize_text(raw, TOPIC_MAX_CHARS)
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(prompt: &str) -> usize {
    prompt.chars().count().div_ceil(4)
}

/// Missing, null and empty-string values take the default.
fn text_or_default(primary: Option<&Value>, secondary: Option<&Value>, default: &str) -> String {
    primary
        .or(secondary)
        .and_then(coerce_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_count(raw: Option<&Value>, max_stories: usize) -> Result<Cardinality, ApiError> {
    let invalid = || ApiError::InvalidField("numStories must be a number".into());
    let n: i64 = match raw {
        None | Some(Value::Null) => return Ok(Cardinality::Single),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(invalid()),
        },
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };
    let clamped = n.clamp(1, max_stories.max(1) as i64) as usize;
    Ok(if clamped == 1 { Cardinality::Single } else { Cardinality::Many(clamped) })
}

/// Turns the loosely typed body into a validated request.
pub fn validate_request(req: &StoryRequest, config: &AppConfig) -> Result<GenerationRequest, ApiError> {
    let language_raw = text_or_default(req.language.as_ref(), None, "english");
    let language = Language::parse(&language_raw).ok_or(ApiError::UnsupportedLanguage)?;

    let topic_raw = text_or_default(req.topic.as_ref(), req.nested("topic"), DEFAULT_TOPIC);
    let topic = sanitize_topic(&topic_raw);
    if topic.is_empty() {
        return Err(ApiError::EmptyTopic);
    }

    let difficulty = sanitize_text(
        &text_or_default(req.difficulty.as_ref(), req.nested("difficulty"), "easy"),
        LABEL_MAX_CHARS,
    );
    let length = sanitize_text(
        &text_or_default(req.length.as_ref(), req.nested("length"), "short"),
        LABEL_MAX_CHARS,
    );
    let cardinality = parse_count(req.num_stories.as_ref(), config.max_stories)?;

    Ok(GenerationRequest {
        language,
        topic,
        difficulty: if difficulty.is_empty() { "easy".into() } else { difficulty },
        length: if length.is_empty() { "short".into() } else { length },
        cardinality,
    })
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    option_count: usize,
    max_prompt_tokens: usize,
}

impl PromptBuilder {
    pub fn new(option_count: usize, max_prompt_tokens: usize) -> Self {
        Self { option_count: option_count.max(2), max_prompt_tokens }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.option_count, config.max_prompt_tokens)
    }

    pub fn build(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        let lang = request.language.as_str();
        let n = self.option_count;
        let last_index = n - 1;
        let fields = format!(
            "- title: short title string (max 6 words)\n\
             - story: very short story (1-4 sentences), simple language for {lang}\n\
             - question: one question about the story (single sentence)\n\
             - options: array of exactly {n} option strings\n\
             - correct: integer from 0 to {last_index} indicating the correct option index"
        );
        let context = format!(
            "Language: {lang}\nTopic hint: {}\nDifficulty: {}\nLength: {}",
            request.topic, request.difficulty, request.length
        );

        let prompt = match request.cardinality {
            Cardinality::Single => format!(
                "You are an assistant that writes short, simple financial-lesson stories for learners.\n\
                 Output MUST be a single valid JSON object only (no extra text). Use the EXACT keys: title, story, question, options, correct.\n\
                 {fields}\n\n{context}\n\nReturn only JSON."
            ),
            Cardinality::Many(count) => format!(
                "You are an assistant that writes short, simple financial-lesson stories for learners.\n\
                 Output MUST be a valid JSON ARRAY with exactly {count} objects (no extra text).\n\
                 Each object MUST use the EXACT keys: title, story, question, options, correct.\n\
                 {fields}\n\n{context}\n\nReturn only a JSON array with {count} complete story objects."
            ),
        };

        let estimated_tokens = estimate_tokens(&prompt);
        if estimated_tokens > self.max_prompt_tokens {
            return Err(ApiError::PromptTooLong { estimated_tokens, limit: self.max_prompt_tokens });
        }
        Ok(prompt)
    }

    /// Completion budget handed to the provider.
    pub fn max_output_tokens(&self, cardinality: Cardinality) -> u32 {
        let per_story = 150 + 40 * self.option_count as u32;
        let count = u32::try_from(cardinality.count()).unwrap_or(u32::MAX);
        per_story.saturating_mul(count).clamp(300, 3000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(body: Value) -> StoryRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn script_tags_are_stripped_once() {
        let once = sanitize_topic("<script>alert(1)</script> loans");
        assert_eq!(once, "scriptalert(1)/script loans");
        assert_eq!(sanitize_topic(&once), once);
    }

    #[test]
    fn sanitize_is_idempotent_on_edge_whitespace() {
        let long = "x ".repeat(80);
        for raw in ["' a", "  \"quoted\"  ", long.as_str()] {
            let once = sanitize_topic(raw);
            assert_eq!(sanitize_topic(&once), once, "input {raw:?}");
            assert!(once.chars().count() <= TOPIC_MAX_CHARS);
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let req = validate_request(&request(json!({})), &AppConfig::default()).unwrap();
        assert_eq!(req.language, Language::English);
        assert_eq!(req.topic, DEFAULT_TOPIC);
        assert_eq!(req.difficulty, "easy");
        assert_eq!(req.cardinality, Cardinality::Single);
    }

    #[test]
    fn nested_options_are_honoured() {
        let body = json!({ "language": "Tamil", "numStories": 3, "options": { "topic": "budgeting", "difficulty": "hard" } });
        let req = validate_request(&request(body), &AppConfig::default()).unwrap();
        assert_eq!(req.language, Language::Tamil);
        assert_eq!(req.topic, "budgeting");
        assert_eq!(req.difficulty, "hard");
        assert_eq!(req.cardinality, Cardinality::Many(3));
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let err = validate_request(&request(json!({ "language": "french" })), &AppConfig::default()).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedLanguage));
    }

    #[test]
    fn topic_of_only_quotes_is_empty() {
        let err = validate_request(&request(json!({ "topic": "<'\">" })), &AppConfig::default()).unwrap_err();
        assert!(matches!(err, ApiError::EmptyTopic));
    }

    #[test]
    fn story_count_is_clamped() {
        let cfg = AppConfig::default();
        let many = validate_request(&request(json!({ "numStories": 50 })), &cfg).unwrap();
        assert_eq!(many.cardinality, Cardinality::Many(10));
        let zero = validate_request(&request(json!({ "numStories": "0" })), &cfg).unwrap();
        assert_eq!(zero.cardinality, Cardinality::Single);
        let bad = validate_request(&request(json!({ "numStories": "lots" })), &cfg).unwrap_err();
        assert!(matches!(bad, ApiError::InvalidField(_)));
    }

    #[test]
    fn prompt_mentions_shape_and_option_count() {
        let builder = PromptBuilder::new(4, 2000);
        let mut req = validate_request(&request(json!({ "topic": "loans" })), &AppConfig::default()).unwrap();
        let single = builder.build(&req).unwrap();
        assert!(single.contains("single valid JSON object"));
        assert!(single.contains("exactly 4 option strings"));
        assert!(single.contains("Topic hint: loans"));

        req.cardinality = Cardinality::Many(3);
        let multi = builder.build(&req).unwrap();
        assert!(multi.contains("JSON ARRAY with exactly 3 objects"));
    }

    #[test]
    fn prompt_over_ceiling_is_rejected() {
        let req = validate_request(&request(json!({})), &AppConfig::default()).unwrap();
        let err = PromptBuilder::new(2, 10).build(&req).unwrap_err();
        assert!(matches!(err, ApiError::PromptTooLong { limit: 10, .. }));
    }

    #[test]
    fn output_budget_saturates_for_huge_batches() {
        let builder = PromptBuilder::new(10, 2000);
        assert_eq!(builder.max_output_tokens(Cardinality::Single), 550);
        assert_eq!(builder.max_output_tokens(Cardinality::Many(usize::MAX)), 3000);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }
}
