//! Tests for model lookup, default resolution and configuration changes.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use vellum_core::{
    GenerationOutput, GenerationParams, ModelConfig, ModelId, ModelLimits, ProviderKind,
};
use vellum_error::{ConfigurationErrorKind, ProviderError, VellumErrorKind};
use vellum_interface::ProviderAdapter;
use vellum_registry::ModelRegistry;

struct EchoAdapter;

#[async_trait]
impl ProviderAdapter for EchoAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
        _timeout: Duration,
    ) -> Result<GenerationOutput, ProviderError> {
        Ok(GenerationOutput::new(prompt.to_string(), 1))
    }
}

fn model(id: i64, enabled: bool, is_default: bool) -> ModelConfig {
    ModelConfig::builder()
        .id(ModelId(id))
        .name(format!("model-{}", id))
        .provider(ProviderKind::OpenAiCompatible)
        .model_name("echo")
        .enabled(enabled)
        .is_default(is_default)
        .build()
        .expect("Valid config")
}

async fn registry_with(models: Vec<ModelConfig>) -> ModelRegistry {
    let registry = ModelRegistry::new();
    for config in models {
        registry
            .register(config, Arc::new(EchoAdapter))
            .await
            .expect("Registers");
    }
    registry
}

#[tokio::test]
async fn test_list_enabled_is_ordered_by_id() {
    let registry = registry_with(vec![model(3, true, false), model(1, true, false), model(2, false, false)]).await;

    let ids: Vec<_> = registry
        .list_enabled()
        .await
        .iter()
        .map(|c| *c.id())
        .collect();
    assert_eq!(ids, vec![ModelId(1), ModelId(3)]);
    assert_eq!(registry.list_all().await.len(), 3);
}

#[tokio::test]
async fn test_default_prefers_flag_then_lowest_enabled() {
    let registry = registry_with(vec![model(1, true, false), model(2, true, true)]).await;
    assert_eq!(*registry.get_default().await.expect("Default").id(), ModelId(2));

    registry.set_enabled(ModelId(2), false).await.expect("Disables");
    assert_eq!(*registry.get_default().await.expect("Fallback").id(), ModelId(1));

    registry.set_enabled(ModelId(1), false).await.expect("Disables");
    let err = registry.get_default().await.expect_err("Nothing enabled");
    assert!(matches!(
        err.kind(),
        VellumErrorKind::Configuration(e) if e.kind == ConfigurationErrorKind::NoDefaultModel
    ));
}

#[tokio::test]
async fn test_set_default_clears_previous() {
    let registry = registry_with(vec![model(1, true, true), model(2, true, false)]).await;

    registry.set_default(ModelId(2)).await.expect("Sets default");

    let defaults: Vec<_> = registry
        .list_all()
        .await
        .into_iter()
        .filter(|c| *c.is_default())
        .map(|c| *c.id())
        .collect();
    assert_eq!(defaults, vec![ModelId(2)]);
    assert!(registry.set_default(ModelId(9)).await.expect_err("Unknown").is_not_found());
}

#[tokio::test]
async fn test_resolve_rejects_unknown_and_disabled() {
    let registry = registry_with(vec![model(1, true, false), model(2, false, false)]).await;

    assert!(registry.resolve(ModelId(1)).await.is_ok());
    let unknown = registry.resolve(ModelId(7)).await.expect_err("Unknown");
    assert_eq!(unknown.kind, ConfigurationErrorKind::UnknownModel(7));
    let disabled = registry.resolve(ModelId(2)).await.expect_err("Disabled");
    assert_eq!(disabled.kind, ConfigurationErrorKind::DisabledModel(2));
}

#[tokio::test]
async fn test_duplicate_registration_fails() {
    let registry = registry_with(vec![model(1, true, false)]).await;
    let err = registry
        .register(model(1, true, false), Arc::new(EchoAdapter))
        .await
        .expect_err("Duplicate");
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_get_unknown_is_not_found() {
    let registry = ModelRegistry::new();
    assert!(registry.get(ModelId(1)).await.expect_err("Missing").is_not_found());
    assert!(registry.stats(ModelId(1)).await.expect_err("Missing").is_not_found());
    assert!(
        registry
            .record_outcome(ModelId(1), true, 1, 1)
            .await
            .expect_err("Missing")
            .is_not_found()
    );
}

#[tokio::test]
async fn test_update_params_and_limits() {
    let registry = registry_with(vec![model(1, true, false)]).await;
    let params = GenerationParams::builder()
        .temperature(0.1)
        .timeout_secs(5u64)
        .build()
        .expect("Valid params");

    registry.update_params(ModelId(1), params.clone()).await.expect("Updates");
    registry
        .update_limits(ModelId(1), ModelLimits::new(None, Some(1)))
        .await
        .expect("Updates");

    let resolved = registry.resolve(ModelId(1)).await.expect("Resolves");
    assert_eq!(resolved.config().params(), &params);
    let guard = resolved.limiter().acquire().await.expect("Admitted");
    assert!(resolved.limiter().try_acquire().is_none());
    drop(guard);
}

#[tokio::test]
async fn test_stats_success_rate() {
    let registry = registry_with(vec![model(1, true, false)]).await;
    registry.record_outcome(ModelId(1), true, 100, 1000).await.expect("Records");
    registry.record_outcome(ModelId(1), false, 0, 500).await.expect("Records");

    let stats = registry.stats(ModelId(1)).await.expect("Stats");
    assert_eq!(*stats.total_calls(), 2);
    assert_eq!(*stats.success_calls(), 1);
    assert_eq!(*stats.total_tokens(), 100);
    assert_eq!(*stats.total_duration_ms(), 1500);
    assert!((stats.success_rate() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_connection_check_reaches_disabled_model() {
    let registry = registry_with(vec![model(1, false, false)]).await;

    let check = registry
        .check_connection(ModelId(1), "ping")
        .await
        .expect("Checks");
    assert!(check.success);
    assert_eq!(check.response.as_deref(), Some("ping"));
    assert_eq!(check.tokens_used, Some(1));
    assert!(check.error.is_none());

    let stats = registry.stats(ModelId(1)).await.expect("Stats");
    assert_eq!((*stats.total_calls(), *stats.success_calls()), (1, 1));

    assert!(
        registry
            .check_connection(ModelId(9), "ping")
            .await
            .expect_err("Missing")
            .is_not_found()
    );
}
