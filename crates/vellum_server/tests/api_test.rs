//! Route-level tests against in-memory collaborators.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use vellum_core::{
    Credentials, GenerationOutput, GenerationParams, ModelConfig, ModelId, Proposal, ProposalId,
    ProposalStatus, ProviderKind,
};
use vellum_error::{ProviderError, ProviderErrorKind};
use vellum_interface::ProviderAdapter;
use vellum_orchestrator::{Orchestrator, OrchestratorSettings};
use vellum_progress::{DisabledPublisher, ProgressHub};
use vellum_registry::ModelRegistry;
use vellum_server::{ApiState, EngineSettings, build_in_memory, create_router};
use vellum_store::{InMemoryProposalSource, InMemoryVersionStore};

const CONTENT: &str = "## Executive Summary\nA phased migration.\n\n## Technical Solution\nLift and shift.";

struct MockAdapter {
    outcome: Result<&'static str, ProviderErrorKind>,
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
        _timeout: Duration,
    ) -> Result<GenerationOutput, ProviderError> {
        match &self.outcome {
            Ok(text) => Ok(GenerationOutput::new(text.to_string(), 120)),
            Err(kind) => Err(ProviderError::new(kind.clone())),
        }
    }
}

fn config(id: i64) -> ModelConfig {
    ModelConfig::builder()
        .id(ModelId(id))
        .name(format!("model-{}", id))
        .provider(ProviderKind::OpenAiCompatible)
        .model_name("mock")
        .credentials(Credentials::inline("sk-secret-value"))
        .params(GenerationParams::builder().max_retries(0u32).build().unwrap())
        .is_default(id == 1)
        .build()
        .unwrap()
}

async fn app(with_hub: bool) -> Router {
    let registry = ModelRegistry::new();
    registry
        .register(config(1), Arc::new(MockAdapter { outcome: Ok(CONTENT) }))
        .await
        .unwrap();
    registry
        .register(
            config(2),
            Arc::new(MockAdapter {
                outcome: Err(ProviderErrorKind::InvalidRequest("bad prompt".to_string())),
            }),
        )
        .await
        .unwrap();

    let proposals = InMemoryProposalSource::new();
    proposals
        .insert(Proposal::new(
            ProposalId(1),
            "Cloud migration".to_string(),
            "Acme Bank".to_string(),
            "Move the ledger".to_string(),
            ProposalStatus::Draft,
        ))
        .await;

    let hub = with_hub.then(ProgressHub::new);
    let sink: Arc<dyn vellum_interface::ProgressSink> = match &hub {
        Some(hub) => Arc::new(hub.clone()),
        None => Arc::new(DisabledPublisher),
    };
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(InMemoryVersionStore::new()),
        Arc::new(proposals),
        sink,
        OrchestratorSettings::builder()
            .max_models_per_batch(3_usize)
            .build()
            .unwrap(),
    );
    create_router(ApiState::new(orchestrator, hub))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Poll the batch endpoint until every member is terminal.
async fn wait_for_batch(app: &Router, batch_id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, "GET", &format!("/batches/{}", batch_id), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "in_progress" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("batch {} did not finish", batch_id);
}

#[tokio::test]
async fn test_health() {
    let app = app(true).await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_generate_then_curate() {
    let app = app(true).await;

    let (status, handle) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 1, "model_ids": [1, 2] })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let members = handle["versions"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["version_number"], 1);
    assert_eq!(members[1]["version_number"], 2);

    let batch = wait_for_batch(&app, handle["batch_id"].as_str().unwrap()).await;
    assert_eq!(batch["status"], "partial");

    let ok_id = members[0]["version_id"].as_i64().unwrap();
    let failed_id = members[1]["version_id"].as_i64().unwrap();

    let (status, version) = send(&app, "GET", &format!("/versions/{}", ok_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version["status"], "completed");

    let (status, list) = send(&app, "GET", "/versions?proposal_id=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    // Failed versions cannot be selected
    let (status, body) = send(&app, "POST", &format!("/versions/{}/select", failed_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().is_some());

    let (status, selected) = send(&app, "POST", &format!("/versions/{}/select", ok_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected["selected"], true);

    let (status, body) = send(&app, "GET", "/proposals/1/selected", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected"]["id"], ok_id);

    let (status, rated) = send(
        &app,
        "POST",
        &format!("/versions/{}/rate", ok_id),
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rated["rating"], 5);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/versions/{}/rate", ok_id),
        Some(json!({ "rating": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, report) = send(
        &app,
        "POST",
        "/compare",
        Some(json!({ "version_ids": [ok_id, failed_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["summary"]["total_versions"], 2);
}

#[tokio::test]
async fn test_iterate_links_parent() {
    let app = app(true).await;
    let (_, handle) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 1, "model_ids": [1] })),
    )
    .await;
    wait_for_batch(&app, handle["batch_id"].as_str().unwrap()).await;
    let parent = handle["versions"][0]["version_id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/versions/{}/iterate", parent),
        Some(json!({ "feedback": "   ", "model_ids": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, child) = send(
        &app,
        "POST",
        &format!("/versions/{}/iterate", parent),
        Some(json!({ "feedback": "Add a risk section", "model_ids": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(child["parent_version_id"], parent);
    assert_eq!(child["versions"][0]["version_number"], 2);
    wait_for_batch(&app, child["batch_id"].as_str().unwrap()).await;

    let child_id = child["versions"][0]["version_id"].as_i64().unwrap();
    let (status, chain) = send(&app, "GET", &format!("/versions/{}/lineage", child_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let chain = chain.as_array().unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0]["id"], parent);

    let (status, children) = send(&app, "GET", &format!("/versions/{}/children", parent), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(children[0]["id"], child_id);
}

#[tokio::test]
async fn test_rejected_dispatches() {
    let app = app(true).await;

    let (status, body) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 1, "model_ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("At least one model"));

    let (status, _) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 1, "model_ids": [99] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 1, "model_ids": [1, 1, 2, 2] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 404, "model_ids": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, list) = send(&app, "GET", "/versions?proposal_id=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_lookup_errors() {
    let app = app(true).await;

    let (status, _) = send(&app, "GET", "/versions/12345", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/batches/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not-a-uuid"));

    let (status, _) = send(
        &app,
        "GET",
        "/batches/6f1c2b4e-8a3d-4f5e-9b7c-1d2e3f4a5b6c",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/compare", Some(json!({ "version_ids": [1] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_models_hide_credentials() {
    let app = app(true).await;

    let (status, models) = send(&app, "GET", "/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models.as_array().unwrap().len(), 2);
    assert!(!models.to_string().contains("sk-secret-value"));

    let (status, default) = send(&app, "GET", "/models/default", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(default["id"], 1);

    let (status, stats) = send(&app, "GET", "/models/1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_calls"], 0);

    let (status, _) = send(&app, "GET", "/models/77/stats", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_model_administration() {
    let app = app(true).await;

    let (status, view) = send(&app, "POST", "/models/2/set-default", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["is_default"], true);
    let (_, default) = send(&app, "GET", "/models/default", None).await;
    assert_eq!(default["id"], 2);
    let (_, models) = send(&app, "GET", "/models", None).await;
    assert_eq!(models[0]["is_default"], false);

    let (status, view) = send(
        &app,
        "PUT",
        "/models/1",
        Some(json!({ "params": { "max_tokens": 900 }, "limits": { "max_concurrent": 2 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["max_tokens"], 900);
    assert_eq!(view["limits"]["max_concurrent"], 2);
    assert_eq!(view["enabled"], true);

    let (status, view) = send(&app, "PUT", "/models/2", Some(json!({ "enabled": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["enabled"], false);
    let (status, _) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 1, "model_ids": [2] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "PUT", "/models/99", Some(json!({ "enabled": true }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", "/models/99/set-default", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_model_connection_check() {
    let app = app(true).await;

    let (status, body) = send(&app, "POST", "/models/1/test", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], CONTENT);
    assert_eq!(body["tokens_used"], 120);

    let (status, body) = send(
        &app,
        "POST",
        "/models/2/test",
        Some(json!({ "prompt": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("bad prompt"));

    let (_, stats) = send(&app, "GET", "/models/2/stats", None).await;
    assert_eq!(stats["total_calls"], 1);
    assert_eq!(stats["success_calls"], 0);

    let (status, _) = send(&app, "POST", "/models/99/test", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_progress_stream() {
    let router = app(true).await;
    let request = Request::builder()
        .uri("/proposals/1/progress")
        .header("x-session-id", "session-a")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    let disabled = app(false).await;
    let (status, body) = send(&disabled, "GET", "/proposals/1/progress", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("disabled"));
}

#[tokio::test]
async fn test_generation_without_progress() {
    let app = app(false).await;
    let (status, handle) = send(
        &app,
        "POST",
        "/generate",
        Some(json!({ "proposal_id": 1, "model_ids": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let batch = wait_for_batch(&app, handle["batch_id"].as_str().unwrap()).await;
    assert_eq!(batch["status"], "completed");
}

#[tokio::test]
async fn test_in_memory_assembly_seeds_proposals() {
    let settings = EngineSettings::from_toml_str(
        r#"
        [[models]]
        id = 1
        name = "Local"
        provider = "ollama"
        model_name = "llama3"

        [[proposals]]
        id = 3
        title = "Analytics"
        customer_name = "Globex"
        requirements = "Dashboards"
        status = "draft"
        "#,
    )
    .unwrap();
    let (state, proposals) = build_in_memory(&settings).await.unwrap();
    assert!(state.hub.is_some());

    use vellum_interface::ProposalSource;
    let proposal = proposals.get_proposal(ProposalId(3)).await.unwrap();
    assert_eq!(proposal.customer_name, "Globex");

    let app = create_router(state);
    let (status, models) = send(&app, "GET", "/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models[0]["provider"], "ollama");
}
