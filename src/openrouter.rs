use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
    config::AppConfig,
    generation::{GenerationError, TextGenerator},
    models::{ProbeReport, ProbeStatus},
    normalize::truncate_chars,
};

const LOG_BODY_MAX_CHARS: usize = 200;

static BEARER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[\w\-.~+/=]+").expect("bearer pattern is valid"));

/// Makes an upstream body safe to log: credentials masked, length capped.
pub fn redact_for_log(body: &str, api_key: Option<&str>) -> String {
    let mut cleaned = BEARER.replace_all(body, "Bearer [REDACTED]").into_owned();
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        cleaned = cleaned.replace(key, "***");
    }
    if cleaned.chars().count() > LOG_BODY_MAX_CHARS {
        format!("{}...", truncate_chars(&cleaned, LOG_BODY_MAX_CHARS))
    } else {
        cleaned
    }
}

/// OpenRouter chat-completions client.
pub struct OpenRouterClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_key.clone(), config.api_base.clone(), config.model.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post_chat(&self, content: &str, max_tokens: u32, temperature: Option<f32>) -> Result<reqwest::Response, GenerationError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": max_tokens,
        });
        if let Some(t) = temperature {
            body["temperature"] = json!(t);
        }

        self.client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header("HTTP-Referer", "https://rupayasaathi.vercel.app")
            .header("X-Title", "RupayaSaathi")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e, self.api_key.as_deref()))
    }
}

fn classify_transport(err: &reqwest::Error, api_key: Option<&str>) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(redact_for_log(&err.to_string(), api_key))
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        info!("🔗 Requesting {} story tokens from {} ({})", max_tokens, self.endpoint(), self.model);

        let response = self.post_chat(prompt, max_tokens, Some(0.7)).await?;
        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response ({}): {}", status, redact_for_log(&error_body, self.api_key.as_deref()));
            return Err(GenerationError::HttpStatus { status: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&e, self.api_key.as_deref()))?;
        let generated = generated_text(&body);
        info!("📝 Generated {} chars of model output", generated.chars().count());
        Ok(generated)
    }

    async fn probe(&self) -> ProbeReport {
        match self.post_chat("ping", 5, None).await {
            Ok(resp) if resp.status().is_success() => ProbeReport {
                message: "Generation provider reachable.".into(),
                api_key_present: true,
                status: ProbeStatus::Connected,
                http_status: None,
                error: None,
            },
            Ok(resp) => ProbeReport {
                message: "Invalid or missing API key.".into(),
                api_key_present: true,
                status: ProbeStatus::Error,
                http_status: Some(resp.status().as_u16()),
                error: None,
            },
            Err(err) => ProbeReport {
                message: "Generation provider unreachable.".into(),
                api_key_present: true,
                status: ProbeStatus::Error,
                http_status: None,
                error: Some(err.to_string()),
            },
        }
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls the generated text out of the provider envelope. Unknown shapes
/// degrade to the raw body; this never fails.
pub fn generated_text(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ChatResponse>(body) {
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty());
        if let Some(content) = content {
            return content;
        }
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(s)) => s,
        _ => body.to_string(),
    }
}
