//! HTTP routes for dispatch, curation, comparison and progress streaming.

use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tracing::{debug, info, instrument};
use vellum_core::{
    BatchId, GenerationParams, ModelConfig, ModelId, ModelLimits, ProgressEvent, ProposalId,
    ProposalRequest, ProviderKind, VersionId,
};
use vellum_orchestrator::Orchestrator;
use vellum_progress::ProgressHub;

/// Header carrying the caller's session, attached to progress subscriptions.
pub const SESSION_HEADER: &str = "x-session-id";

/// API server state.
#[derive(Clone, Debug)]
pub struct ApiState {
    /// Generation engine
    pub orchestrator: Orchestrator,
    /// Progress fan-out, absent when progress is disabled
    pub hub: Option<ProgressHub>,
}

impl ApiState {
    /// Creates a new API state.
    pub fn new(orchestrator: Orchestrator, hub: Option<ProgressHub>) -> Self {
        Self { orchestrator, hub }
    }
}

/// Body of `POST /generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Proposal to generate for
    pub proposal_id: ProposalId,
    /// Models to dispatch to
    pub model_ids: Vec<ModelId>,
    /// Payload override; built from the proposal record when absent
    #[serde(default)]
    pub request: Option<ProposalRequest>,
    /// Terminal version the new versions iterate on
    #[serde(default)]
    pub parent_version_id: Option<VersionId>,
}

/// Body of `POST /versions/:id/iterate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterateRequest {
    /// Reviewer feedback
    pub feedback: String,
    /// Models to dispatch to
    pub model_ids: Vec<ModelId>,
}

/// Body of `POST /versions/:id/rate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateRequest {
    /// Rating from 1 to 5
    pub rating: u8,
}

/// Body of `POST /compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    /// Versions to compare
    pub version_ids: Vec<VersionId>,
}

/// Query of `GET /versions`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VersionsQuery {
    /// Proposal whose versions to list
    pub proposal_id: ProposalId,
}

/// Body of `PUT /models/:id`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelUpdate {
    /// Replacement generation parameters
    pub params: Option<GenerationParams>,
    /// Replacement admission limits
    pub limits: Option<ModelLimits>,
    /// New enablement
    pub enabled: Option<bool>,
}

/// Prompt sent by `POST /models/:id/test` when the body names none.
pub const DEFAULT_TEST_PROMPT: &str = "Briefly introduce yourself.";

/// Body of `POST /models/:id/test`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionTestRequest {
    /// Prompt to send
    pub prompt: Option<String>,
}

/// Model configuration as exposed over HTTP. Credentials never leave the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelView {
    /// Model identifier
    pub id: ModelId,
    /// Display name
    pub name: String,
    /// Provider family
    pub provider: ProviderKind,
    /// Provider-side model identifier
    pub model_name: String,
    /// Effective endpoint
    pub base_url: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token cap
    pub max_tokens: u32,
    /// Admission limits
    pub limits: ModelLimits,
    /// Dispatchable
    pub enabled: bool,
    /// Default model flag
    pub is_default: bool,
    /// Free-form description
    pub description: Option<String>,
}

impl From<&ModelConfig> for ModelView {
    fn from(config: &ModelConfig) -> Self {
        Self {
            id: *config.id(),
            name: config.name().clone(),
            provider: *config.provider(),
            model_name: config.model_name().clone(),
            base_url: config.effective_base_url().map(str::to_string),
            temperature: *config.params().temperature(),
            max_tokens: *config.params().max_tokens(),
            limits: *config.limits(),
            enabled: *config.enabled(),
            is_default: *config.is_default(),
            description: config.description().clone(),
        }
    }
}

/// Creates the API router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/generate", post(generate))
        .route("/compare", post(compare))
        .route("/versions", get(list_versions))
        .route("/versions/:id", get(get_version))
        .route("/versions/:id/lineage", get(lineage))
        .route("/versions/:id/children", get(children))
        .route("/versions/:id/rate", post(rate))
        .route("/versions/:id/select", post(select))
        .route("/versions/:id/iterate", post(iterate))
        .route("/proposals/:id/selected", get(selected))
        .route("/proposals/:id/progress", get(progress))
        .route("/batches/:id", get(batch_status))
        .route("/models", get(list_models))
        .route("/models/default", get(default_model))
        .route("/models/:id", put(update_model))
        .route("/models/:id/set-default", post(set_default_model))
        .route("/models/:id/test", post(test_model))
        .route("/models/:id/stats", get(model_stats))
        .with_state(state)
}

/// Health check endpoint.
#[instrument(skip_all)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Dispatch a batch; responds once every version row exists.
#[instrument(skip(state, body), fields(proposal_id = %body.proposal_id, models = body.model_ids.len()))]
async fn generate(
    State(state): State<ApiState>,
    Json(body): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dispatched = state
        .orchestrator
        .dispatch(
            body.proposal_id,
            &body.model_ids,
            body.request,
            body.parent_version_id,
        )
        .await?;
    info!(batch_id = %dispatched.handle.batch_id(), "Batch accepted");
    Ok((StatusCode::ACCEPTED, Json(dispatched.handle)))
}

/// Dispatch an iteration batch from a terminal version.
#[instrument(skip(state, body), fields(parent = id, models = body.model_ids.len()))]
async fn iterate(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<IterateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dispatched = state
        .orchestrator
        .iterate(VersionId(id), &body.feedback, &body.model_ids)
        .await?;
    info!(batch_id = %dispatched.handle.batch_id(), "Iteration accepted");
    Ok((StatusCode::ACCEPTED, Json(dispatched.handle)))
}

#[instrument(skip(state))]
async fn list_versions(
    State(state): State<ApiState>,
    Query(query): Query<VersionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let versions = state.orchestrator.list_versions(query.proposal_id).await?;
    Ok((StatusCode::OK, Json(versions)))
}

#[instrument(skip(state))]
async fn get_version(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state.orchestrator.version(VersionId(id)).await?;
    Ok((StatusCode::OK, Json(version)))
}

/// Ancestors of a version, root first.
#[instrument(skip(state))]
async fn lineage(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let chain = state.orchestrator.lineage(VersionId(id)).await?;
    Ok((StatusCode::OK, Json(chain)))
}

#[instrument(skip(state))]
async fn children(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let children = state.orchestrator.children(VersionId(id)).await?;
    Ok((StatusCode::OK, Json(children)))
}

#[instrument(skip(state))]
async fn rate(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<RateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state.orchestrator.rate(VersionId(id), body.rating).await?;
    Ok((StatusCode::OK, Json(version)))
}

#[instrument(skip(state))]
async fn select(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state.orchestrator.select(VersionId(id)).await?;
    Ok((StatusCode::OK, Json(version)))
}

#[instrument(skip(state))]
async fn selected(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state.orchestrator.selected(ProposalId(id)).await?;
    Ok((StatusCode::OK, Json(json!({ "selected": version }))))
}

#[instrument(skip(state, body), fields(versions = body.version_ids.len()))]
async fn compare(
    State(state): State<ApiState>,
    Json(body): Json<CompareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.orchestrator.compare(&body.version_ids).await?;
    Ok((StatusCode::OK, Json(report)))
}

/// Polling fallback for clients without an event stream.
#[instrument(skip(state))]
async fn batch_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let batch_id = BatchId::parse(&id)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid batch id: {}", id)))?;
    let summary = state.orchestrator.batch_status(batch_id).await?;
    Ok((StatusCode::OK, Json(summary)))
}

/// Stream progress events for a proposal as Server-Sent Events.
#[instrument(skip(state, headers))]
async fn progress(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let hub = state
        .hub
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Progress notifications are disabled"))?;
    let proposal_id = ProposalId(id);
    let session = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    let subscription = match session {
        Some(session) => hub.subscribe_as(session, proposal_id),
        None => hub.subscribe(proposal_id),
    };
    debug!(subscriber = subscription.id(), "Progress stream opened");

    let events = subscription.filter_map(|event| async move {
        match Event::default().event(ProgressEvent::EVENT_TYPE).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(err) => {
                tracing::warn!(error = %err, "Progress event not serializable");
                None
            }
        }
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[instrument(skip(state))]
async fn list_models(State(state): State<ApiState>) -> impl IntoResponse {
    let models: Vec<ModelView> = state
        .orchestrator
        .registry()
        .list_all()
        .await
        .iter()
        .map(ModelView::from)
        .collect();
    (StatusCode::OK, Json(models))
}

#[instrument(skip(state))]
async fn default_model(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let config = state.orchestrator.registry().get_default().await?;
    Ok((StatusCode::OK, Json(ModelView::from(&config))))
}

/// Apply a partial configuration change and return the new view.
#[instrument(skip(state, body))]
async fn update_model(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<ModelUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.orchestrator.registry();
    let model_id = ModelId(id);
    registry.get(model_id).await?;
    if let Some(params) = body.params {
        registry.update_params(model_id, params).await?;
    }
    if let Some(limits) = body.limits {
        registry.update_limits(model_id, limits).await?;
    }
    if let Some(enabled) = body.enabled {
        registry.set_enabled(model_id, enabled).await?;
    }
    let config = registry.get(model_id).await?;
    info!(model_id = %model_id, "Model updated");
    Ok((StatusCode::OK, Json(ModelView::from(&config))))
}

#[instrument(skip(state))]
async fn set_default_model(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.orchestrator.registry();
    registry.set_default(ModelId(id)).await?;
    let config = registry.get(ModelId(id)).await?;
    Ok((StatusCode::OK, Json(ModelView::from(&config))))
}

/// One unretried call to the model. A provider failure is still a 200.
#[instrument(skip(state, body))]
async fn test_model(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<ConnectionTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let prompt = body
        .prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_PROMPT.to_string());
    let check = state
        .orchestrator
        .registry()
        .check_connection(ModelId(id), &prompt)
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "model_id": id,
            "success": check.success,
            "response": check.response,
            "error": check.error,
            "duration_ms": check.duration_ms,
            "tokens_used": check.tokens_used,
        })),
    ))
}

#[instrument(skip(state))]
async fn model_stats(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.orchestrator.registry().stats(ModelId(id)).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "model_id": id,
            "total_calls": stats.total_calls(),
            "success_calls": stats.success_calls(),
            "total_tokens": stats.total_tokens(),
            "total_duration_ms": stats.total_duration_ms(),
            "success_rate": stats.success_rate(),
            "average_duration_ms": stats.average_duration_ms(),
        })),
    ))
}
