use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ProbeReport, ProbeStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}")]
    HttpStatus { status: u16 },
    #[error("timed out")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transport,
    HttpStatus(u16),
}

impl From<&GenerationError> for FailureKind {
    fn from(err: &GenerationError) -> Self {
        match err {
            GenerationError::Transport(_) => Self::Transport,
            GenerationError::HttpStatus { status } => Self::HttpStatus(*status),
            GenerationError::Timeout => Self::Timeout,
        }
    }
}

/// Result of a single generation attempt, consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success(String),
    /// No credential configured; nothing was sent.
    Unavailable,
    Failure(FailureKind),
}

/// A text-generation provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Whether a credential is present. Unconfigured generators are never called.
    fn is_configured(&self) -> bool;

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError>;

    /// Minimal reachability check; never builds a story.
    async fn probe(&self) -> ProbeReport;
}

/// One attempt, no retries, cancelled when `deadline` elapses.
pub async fn generate_with_deadline(
    generator: &dyn TextGenerator,
    prompt: &str,
    max_tokens: u32,
    deadline: Duration,
) -> GenerationOutcome {
    if !generator.is_configured() {
        info!("🔌 No provider credential configured, skipping generation");
        return GenerationOutcome::Unavailable;
    }

    match tokio::time::timeout(deadline, generator.complete(prompt, max_tokens)).await {
        Ok(Ok(text)) => GenerationOutcome::Success(text),
        Ok(Err(err)) => {
            warn!(error = %err, "❌ Generation failed");
            GenerationOutcome::Failure(FailureKind::from(&err))
        }
        Err(_) => {
            warn!(deadline_secs = deadline.as_secs(), "⏱️ Generation timed out, request cancelled");
            GenerationOutcome::Failure(FailureKind::Timeout)
        }
    }
}

/// Probe bounded by the same deadline as generation.
pub async fn probe_with_deadline(generator: &dyn TextGenerator, deadline: Duration) -> ProbeReport {
    if !generator.is_configured() {
        return ProbeReport {
            message: "Invalid or missing API key.".into(),
            api_key_present: false,
            status: ProbeStatus::Error,
            http_status: None,
            error: None,
        };
    }
    match tokio::time::timeout(deadline, generator.probe()).await {
        Ok(report) => report,
        Err(_) => ProbeReport {
            message: "Generation provider did not respond in time.".into(),
            api_key_present: true,
            status: ProbeStatus::Error,
            http_status: None,
            error: Some(GenerationError::Timeout.to_string()),
        },
    }
}
