use axum::{
    Json, Router,
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::ApiError,
    models::{CheckAnswerRequest, CheckAnswerResponse, ProbeStatus, StoryRequest},
    pipeline::{PipelineResponse, StoryPipeline},
    progress::{ProgressSnapshot, ProgressTracker},
    prompt::sanitize_text,
};

const USERNAME_MAX_CHARS: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<StoryPipeline>,
    pub progress: Arc<ProgressTracker>,
    pub development: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/story", post(generate_story).fallback(not_allowed))
        .route("/api/generateStory", post(generate_story).fallback(not_allowed))
        .route("/api/checkKey", post(check_key).fallback(not_allowed))
        .route("/api/checkAnswer", post(check_answer).fallback(not_allowed))
        .route("/api/health", get(health))
        .route("/api/progress/:username", get(get_progress))
        .route("/api/progress/:username/batch", post(start_batch).fallback(not_allowed))
        .route("/api/progress/:username/story", post(complete_story).fallback(not_allowed))
        .route("/api/progress/:username/answer", post(record_answer).fallback(not_allowed))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

/// Bare OPTIONS succeeds; any other unsupported method is a 405.
async fn not_allowed(method: Method) -> Response {
    if method == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        ApiError::MethodNotAllowed.into_response()
    }
}

/// Empty and `null` bodies mean "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    match serde_json::from_slice::<Value>(body).map_err(|_| ApiError::InvalidBody)? {
        Value::Null => Ok(T::default()),
        value => serde_json::from_value(value).map_err(|_| ApiError::InvalidBody),
    }
}

pub async fn generate_story(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: StoryRequest = parse_body(&body)?;
    match state.pipeline.handle(&request).await? {
        PipelineResponse::Stories(outcome) => {
            tracing::debug!(source = ?outcome.source, items = outcome.payload.items().len(), "Story response ready");
            Ok(Json(outcome.payload).into_response())
        }
        PipelineResponse::Probe(report) => Ok(Json(report).into_response()),
    }
}

pub async fn check_key(State(state): State<AppState>) -> Response {
    let report = state.pipeline.probe().await;
    let status = match report.status {
        ProbeStatus::Connected => "ok",
        ProbeStatus::Error => "error",
    };
    Json(json!({ "status": status, "message": report.message })).into_response()
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "generationConfigured": state.pipeline.generator_configured(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn parse_answer(value: Option<&Value>, field: &str) -> Result<i64, ApiError> {
    let invalid = || ApiError::InvalidField("Answers must be valid numbers".into());
    match value {
        None | Some(Value::Null) => Err(ApiError::InvalidField(format!("{field} is required"))),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

pub async fn check_answer(body: Bytes) -> Result<Json<CheckAnswerResponse>, ApiError> {
    let request: CheckAnswerRequest = parse_body(&body)?;
    let user_answer = parse_answer(request.user_answer.as_ref(), "userAnswer")?;
    let correct_answer = parse_answer(request.correct_answer.as_ref(), "correctAnswer")?;
    Ok(Json(CheckAnswerResponse { correct: user_answer == correct_answer, user_answer, correct_answer }))
}

fn username(raw: &str) -> Result<String, ApiError> {
    let name = sanitize_text(raw, USERNAME_MAX_CHARS);
    if name.is_empty() {
        return Err(ApiError::InvalidField("username is required".into()));
    }
    Ok(name)
}

fn difficulty(raw: Option<String>) -> String {
    let d = sanitize_text(raw.as_deref().unwrap_or("easy"), 20).to_lowercase();
    if d.is_empty() { "easy".into() } else { d }
}

#[derive(Debug, Deserialize, Default)]
struct BatchBody {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize, Default)]
struct StoryDoneBody {
    #[serde(default)]
    difficulty: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AnswerBody {
    #[serde(default)]
    correct: Option<bool>,
    #[serde(default)]
    difficulty: Option<String>,
}

pub async fn get_progress(State(state): State<AppState>, Path(user): Path<String>) -> Result<Json<ProgressSnapshot>, ApiError> {
    Ok(Json(state.progress.snapshot(&username(&user)?)))
}

pub async fn start_batch(State(state): State<AppState>, Path(user): Path<String>, body: Bytes) -> Result<Json<ProgressSnapshot>, ApiError> {
    let user = username(&user)?;
    let body: BatchBody = parse_body(&body)?;
    state
        .progress
        .start_batch(&user, body.count)
        .map(Json)
        .map_err(|e| ApiError::internal(e, state.development))
}

pub async fn complete_story(State(state): State<AppState>, Path(user): Path<String>, body: Bytes) -> Result<Json<ProgressSnapshot>, ApiError> {
    let user = username(&user)?;
    let body: StoryDoneBody = parse_body(&body)?;
    state
        .progress
        .complete_story(&user, &difficulty(body.difficulty))
        .map(Json)
        .map_err(|e| ApiError::internal(e, state.development))
}

pub async fn record_answer(State(state): State<AppState>, Path(user): Path<String>, body: Bytes) -> Result<Json<ProgressSnapshot>, ApiError> {
    let user = username(&user)?;
    let body: AnswerBody = parse_body(&body)?;
    let correct = body.correct.ok_or_else(|| ApiError::InvalidField("correct is required".into()))?;
    state
        .progress
        .record_answer(&user, correct, &difficulty(body.difficulty))
        .map(Json)
        .map_err(|e| ApiError::internal(e, state.development))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        generation::testing::ScriptedGenerator,
        models::StoryItem,
        progress::InMemoryStore,
    };
    use axum::{body::Body, http::Request};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn app_with(generator: Arc<ScriptedGenerator>) -> Router {
        let config = AppConfig::default();
        router(AppState {
            pipeline: Arc::new(StoryPipeline::new(config, generator)),
            progress: Arc::new(ProgressTracker::new(Arc::new(InMemoryStore::default()))),
            development: false,
        })
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn french_is_a_bad_request_without_calls() {
        let generator = Arc::new(ScriptedGenerator::replying("{}"));
        let (status, body) = send(app_with(generator.clone()), Method::POST, "/api/story", r#"{"language":"french"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Unsupported language"));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let (status, body) = send(app_with(Arc::new(ScriptedGenerator::unconfigured())), Method::POST, "/api/story", "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON in request body");
    }

    #[tokio::test]
    async fn get_is_not_allowed() {
        let (status, body) = send(app_with(Arc::new(ScriptedGenerator::unconfigured())), Method::GET, "/api/story", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Only POST allowed");
    }

    #[tokio::test]
    async fn no_credential_still_serves_stories() {
        let generator = Arc::new(ScriptedGenerator::unconfigured());
        let (status, body) = send(app_with(generator.clone()), Method::POST, "/api/generateStory", "").await;
        assert_eq!(status, StatusCode::OK);
        let item: StoryItem = serde_json::from_value(body).unwrap();
        assert!(item.is_within_bounds());
        assert_eq!(generator.calls(), 0);

        let (status, body) = send(app_with(generator), Method::POST, "/api/story", r#"{"numStories":3,"language":"tamil"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_mode_is_always_ok() {
        let (status, body) = send(app_with(Arc::new(ScriptedGenerator::unconfigured())), Method::POST, "/api/story", r#"{"test":true}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["apiKeyPresent"], false);
        assert_eq!(body["status"], "error");

        let (status, body) = send(app_with(Arc::new(ScriptedGenerator::replying("pong"))), Method::POST, "/api/checkKey", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn non_object_options_do_not_break_the_body() {
        let (status, body) = send(app_with(Arc::new(ScriptedGenerator::unconfigured())), Method::POST, "/api/story", r#"{"test":true,"options":"x"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["apiKeyPresent"], false);

        let (status, body) = send(app_with(Arc::new(ScriptedGenerator::unconfigured())), Method::POST, "/api/story", r#"{"numStories":2,"options":[1,2]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn answers_are_compared_numerically() {
        let app = app_with(Arc::new(ScriptedGenerator::unconfigured()));
        let (status, body) = send(app.clone(), Method::POST, "/api/checkAnswer", r#"{"userAnswer":"1","correctAnswer":1}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "correct": true, "userAnswer": 1, "correctAnswer": 1 }));

        let (status, body) = send(app.clone(), Method::POST, "/api/checkAnswer", r#"{"correctAnswer":1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "userAnswer is required");

        let (status, _) = send(app, Method::POST, "/api/checkAnswer", r#"{"userAnswer":"b","correctAnswer":1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn progress_round_trip_over_http() {
        let app = app_with(Arc::new(ScriptedGenerator::unconfigured()));
        send(app.clone(), Method::POST, "/api/progress/asha/batch", r#"{"count":2}"#).await;
        send(app.clone(), Method::POST, "/api/progress/asha/answer", r#"{"correct":true,"difficulty":"Hard"}"#).await;
        let (status, body) = send(app.clone(), Method::POST, "/api/progress/asha/story", r#"{"difficulty":"hard"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storiesCompleted"], 1);
        assert_eq!(body["progressPercent"], 50.0);

        let (_, body) = send(app.clone(), Method::GET, "/api/progress/asha", "").await;
        assert_eq!(body["score"], 10);
        assert_eq!(body["storyDifficultyStats"]["hard"]["correctAnswers"], 1);

        let (status, _) = send(app, Method::POST, "/api/progress/asha/answer", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
