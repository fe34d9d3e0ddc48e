//! Story request orchestration:
//! validate → prompt → generate (bounded) → extract → normalize, with every
//! upstream or parsing problem absorbed by fallback content.

use std::{sync::Arc, time::Duration};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ApiError,
    extract::{Extraction, ResponseExtractor},
    fallback::FallbackProvider,
    generation::{generate_with_deadline, probe_with_deadline, FailureKind, GenerationOutcome, TextGenerator},
    models::{Cardinality, GenerationRequest, Language, ProbeReport, StoryItem, StoryPayload, StoryRequest},
    normalize::Normalizer,
    prompt::{validate_request, PromptBuilder},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Unavailable,
    Upstream(FailureKind),
    NothingExtracted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorySource {
    Generated { strategy: &'static str, rejected: usize, padded: usize },
    Fallback(FallbackReason),
}

/// Final stories plus where they came from, for callers that keep records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryOutcome {
    pub payload: StoryPayload,
    pub source: StorySource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResponse {
    Stories(StoryOutcome),
    Probe(ProbeReport),
}

pub struct StoryPipeline {
    config: AppConfig,
    generator: Arc<dyn TextGenerator>,
    prompts: PromptBuilder,
    extractor: ResponseExtractor,
    normalizer: Normalizer,
    fallback: FallbackProvider,
}

impl StoryPipeline {
    pub fn new(config: AppConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            prompts: PromptBuilder::from_config(&config),
            normalizer: Normalizer::new(config.option_count),
            extractor: ResponseExtractor::default(),
            fallback: FallbackProvider::new(),
            generator,
            config,
        }
    }

    fn deadline(&self) -> Duration {
        self.config.generation_timeout
    }

    pub fn generator_configured(&self) -> bool {
        self.generator.is_configured()
    }

    pub async fn probe(&self) -> ProbeReport {
        let report = probe_with_deadline(self.generator.as_ref(), self.deadline()).await;
        info!(status = ?report.status, key_present = report.api_key_present, "🔎 Provider probe finished");
        report
    }

    /// Entry point for one inbound request. Only input errors are returned.
    pub async fn handle(&self, request: &StoryRequest) -> Result<PipelineResponse, ApiError> {
        if request.is_test() {
            return Ok(PipelineResponse::Probe(self.probe().await));
        }
        let span = tracing::info_span!("story_request", request_id = %Uuid::new_v4());
        async move {
            let validated = validate_request(request, &self.config)?;
            let prompt = self.prompts.build(&validated)?;
            Ok::<_, ApiError>(PipelineResponse::Stories(self.run(&validated, &prompt).await))
        }
        .instrument(span)
        .await
    }

    /// Runs a validated request. Never fails.
    pub async fn run(&self, request: &GenerationRequest, prompt: &str) -> StoryOutcome {
        info!(
            language = request.language.as_str(),
            topic = %request.topic,
            count = request.cardinality.count(),
            "🚀 Generating stories"
        );
        let max_tokens = self.prompts.max_output_tokens(request.cardinality);

        let raw = match generate_with_deadline(self.generator.as_ref(), prompt, max_tokens, self.deadline()).await {
            GenerationOutcome::Success(raw) => raw,
            GenerationOutcome::Unavailable => return self.fall_back(request, FallbackReason::Unavailable),
            GenerationOutcome::Failure(kind) => return self.fall_back(request, FallbackReason::Upstream(kind)),
        };

        let (strategy, records) = match self.extractor.extract(&raw, request.cardinality) {
            Extraction::Recovered { strategy, records } => (strategy, records),
            Extraction::NotFound => {
                warn!(output_chars = raw.chars().count(), "⚠️ Could not parse model output");
                return self.fall_back(request, FallbackReason::NothingExtracted);
            }
        };

        let batch = self.normalizer.normalize_batch(&records, request.cardinality.count(), |i| self.substitute(request, i));
        info!(strategy, rejected = batch.rejected, padded = batch.padded, "✅ Stories normalized");

        StoryOutcome {
            payload: into_payload(request.cardinality, batch.items),
            source: StorySource::Generated { strategy, rejected: batch.rejected, padded: batch.padded },
        }
    }

    /// Replacement for one slot of a generated batch.
    fn substitute(&self, request: &GenerationRequest, index: usize) -> StoryItem {
        match request.cardinality {
            Cardinality::Single => self.fallback.canned_story(request.language),
            Cardinality::Many(_) => self.fallback.templated(request.language, &request.topic, index),
        }
    }

    fn fall_back(&self, request: &GenerationRequest, reason: FallbackReason) -> StoryOutcome {
        info!(?reason, "🔄 Serving fallback stories");
        let items = self.fallback.provide(request.language, &request.topic, request.cardinality);
        StoryOutcome { payload: into_payload(request.cardinality, items), source: StorySource::Fallback(reason) }
    }
}

fn into_payload(cardinality: Cardinality, items: Vec<StoryItem>) -> StoryPayload {
    debug_assert!(items.iter().all(StoryItem::is_within_bounds));
    match cardinality {
        Cardinality::Many(_) => StoryPayload::Many(items),
        Cardinality::Single => match items.into_iter().next() {
            Some(item) => StoryPayload::Single(item),
            // Normalization always yields exactly one item here; stay total anyway.
            None => StoryPayload::Single(FallbackProvider::new().canned_story(Language::English)),
        },
    }
}
