//! Process configuration, read once at startup from the environment.

use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1";
pub const MAX_STORIES_CEILING: usize = 50;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Provider credential. `None` routes every generation to fallback content.
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub generation_timeout: Duration,
    /// Options per question, always within 2..=10.
    pub option_count: usize,
    pub max_prompt_tokens: usize,
    /// Largest batch a caller may ask for, always within 1..=50.
    pub max_stories: usize,
    /// Detailed messages on 500 responses.
    pub development: bool,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            generation_timeout: Duration::from_secs(30),
            option_count: 2,
            max_prompt_tokens: 2000,
            max_stories: 10,
            development: false,
            port: 3001,
        }
    }
}

impl AppConfig {
    /// Reads:
    /// - `OPENROUTER_API_KEY`, `OPENROUTER_API_BASE`, `OPENROUTER_MODEL`
    /// - `GENERATION_TIMEOUT_SECS`, `STORY_OPTION_COUNT`, `MAX_PROMPT_TOKENS`, `MAX_STORIES`
    /// - `APP_ENV`, `PORT`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let api_key = lookup("OPENROUTER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let api_base = lookup("OPENROUTER_API_BASE")
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);
        let model = lookup("OPENROUTER_MODEL").unwrap_or(defaults.model);
        let timeout_secs = parse_or(&lookup, "GENERATION_TIMEOUT_SECS", 30u64);
        let option_count = parse_or(&lookup, "STORY_OPTION_COUNT", defaults.option_count).clamp(2, 10);
        let max_prompt_tokens = parse_or(&lookup, "MAX_PROMPT_TOKENS", defaults.max_prompt_tokens);
        let max_stories = parse_or(&lookup, "MAX_STORIES", defaults.max_stories).clamp(1, MAX_STORIES_CEILING);
        let development = lookup("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);
        let port = parse_or(&lookup, "PORT", defaults.port);

        Self {
            api_key,
            api_base,
            model,
            generation_timeout: Duration::from_secs(timeout_secs),
            option_count,
            max_prompt_tokens,
            max_stories,
            development,
            port,
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("⚠️ Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.generation_timeout, Duration::from_secs(30));
        assert_eq!(cfg.option_count, 2);
        assert_eq!(cfg.port, 3001);
        assert!(!cfg.development);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let cfg = config_from(&[("OPENROUTER_API_KEY", "   ")]);
        assert_eq!(cfg.api_key, None);
    }

    #[test]
    fn option_count_is_clamped_and_garbage_ignored() {
        let cfg = config_from(&[("STORY_OPTION_COUNT", "42"), ("PORT", "not-a-port"), ("APP_ENV", "Development")]);
        assert_eq!(cfg.option_count, 10);
        assert_eq!(cfg.port, 3001);
        assert!(cfg.development);
    }

    #[test]
    fn max_stories_has_a_hard_ceiling() {
        assert_eq!(config_from(&[("MAX_STORIES", "1000000")]).max_stories, MAX_STORIES_CEILING);
        assert_eq!(config_from(&[("MAX_STORIES", "0")]).max_stories, 1);
    }
}
