use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use meet_datastore::DataStore;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    dispatch::EvaluationDispatcher, provider::BotProvider, transcript::TranscriptSegment,
    webhook::WebhookProcessor,
};

pub struct AppState<D, P, E> {
    pub processor: WebhookProcessor<D, E>,
    pub provider: Arc<P>,
    /// When set, inbound webhooks must carry it in `x-webhook-secret`.
    pub webhook_secret: Option<String>,
}

// hand-written so the provider does not need to be Clone behind the Arc
impl<D: Clone, P, E: Clone> Clone for AppState<D, P, E> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
            provider: Arc::clone(&self.provider),
            webhook_secret: self.webhook_secret.clone(),
        }
    }
}

pub fn create_router<D, P, E>(state: AppState<D, P, E>) -> Router
where
    D: DataStore + Clone + Send + Sync + 'static,
    P: BotProvider + Send + Sync + 'static,
    E: EvaluationDispatcher + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/provider", post(provider_webhook::<D, P, E>))
        .route("/transcript", get(poll_transcript::<D, P, E>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Provider callback endpoint. Always acknowledges 200 once past the
/// optional secret check, whatever happens internally, so the provider
/// never goes into a retry storm. The body is parsed by hand because a
/// malformed body must also be acknowledged, not rejected.
async fn provider_webhook<D, P, E>(
    State(state): State<AppState<D, P, E>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode
where
    D: DataStore + Clone + Send + Sync + 'static,
    P: BotProvider + Send + Sync + 'static,
    E: EvaluationDispatcher + Clone + Send + Sync + 'static,
{
    if let Some(secret) = &state.webhook_secret {
        let given = headers.get("x-webhook-secret").and_then(|v| v.to_str().ok());
        if given != Some(secret.as_str()) {
            return StatusCode::UNAUTHORIZED;
        }
    }

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(payload) => state.processor.process(&payload).await,
        Err(e) => tracing::warn!(error = %e, "Ignoring non-JSON webhook body"),
    }

    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    pub bot_id: String,
    /// Fetch from the provider's REST API when the live buffer has
    /// nothing, e.g. after the buffer entry was evicted.
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub bot_id: String,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

async fn poll_transcript<D, P, E>(
    State(state): State<AppState<D, P, E>>,
    Query(query): Query<TranscriptQuery>,
) -> impl IntoResponse
where
    D: DataStore + Clone + Send + Sync + 'static,
    P: BotProvider + Send + Sync + 'static,
    E: EvaluationDispatcher + Clone + Send + Sync + 'static,
{
    let mut segments = state.processor.transcripts().read(&query.bot_id);

    if segments.is_empty() && query.fallback {
        match state.provider.fetch_transcript(&query.bot_id).await {
            Ok(fetched) => segments = fetched,
            Err(e) => {
                tracing::error!(error = ?e, bot_id = %query.bot_id, "Transcript fallback failed");
                return (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse {
                        error: "Failed to fetch transcript from provider".into(),
                    }),
                )
                    .into_response();
            }
        }
    }

    Json(TranscriptResponse {
        bot_id: query.bot_id,
        segments,
    })
    .into_response()
}
