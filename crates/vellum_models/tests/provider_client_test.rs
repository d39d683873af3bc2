//! Tests for building clients from model configuration.

use vellum_core::{Credentials, ModelConfig, ModelId, ProviderKind};
use vellum_error::ConfigurationErrorKind;
use vellum_interface::ProviderAdapter;
use vellum_models::ProviderClient;

fn config(provider: ProviderKind, credentials: Credentials, base_url: Option<&str>) -> ModelConfig {
    ModelConfig::builder()
        .id(ModelId(1))
        .name("test")
        .provider(provider)
        .model_name("model-x")
        .credentials(credentials)
        .base_url(base_url.map(str::to_string))
        .build()
        .expect("Valid config")
}

#[test]
fn test_anthropic_config_builds_anthropic_client() {
    let client = ProviderClient::from_config(&config(
        ProviderKind::Anthropic,
        Credentials::inline("sk-ant"),
        None,
    ))
    .expect("Client builds");

    assert!(matches!(client, ProviderClient::Anthropic(_)));
    assert_eq!(client.provider(), ProviderKind::Anthropic);
    assert_eq!(client.model_name(), "model-x");
}

#[test]
fn test_openai_family_uses_compatible_client() {
    for provider in [
        ProviderKind::OpenAi,
        ProviderKind::DeepSeek,
        ProviderKind::Moonshot,
        ProviderKind::Zhipu,
        ProviderKind::Tongyi,
    ] {
        let client =
            ProviderClient::from_config(&config(provider, Credentials::inline("sk"), None))
                .expect("Client builds");
        match client {
            ProviderClient::OpenAiCompatible(inner) => {
                assert!(inner.endpoint().ends_with("/chat/completions"));
                assert_eq!(inner.provider(), provider);
            }
            other => panic!("unexpected client {:?}", other),
        }
    }
}

#[test]
fn test_missing_key_is_configuration_error() {
    let err = ProviderClient::from_config(&config(
        ProviderKind::Moonshot,
        Credentials::from_env("VELLUM_TEST_DEFINITELY_UNSET"),
        None,
    ))
    .expect_err("Key required");

    match err.kind {
        ConfigurationErrorKind::MissingCredentials { model, source_hint } => {
            assert_eq!(model, 1);
            assert_eq!(source_hint, "VELLUM_TEST_DEFINITELY_UNSET");
        }
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_custom_endpoint_requires_base_url() {
    let err = ProviderClient::from_config(&config(
        ProviderKind::OpenAiCompatible,
        Credentials::default(),
        None,
    ))
    .expect_err("No endpoint known");
    assert!(matches!(err.kind, ConfigurationErrorKind::Settings(_)));

    let client = ProviderClient::from_config(&config(
        ProviderKind::OpenAiCompatible,
        Credentials::default(),
        Some("http://localhost:8000/v1"),
    ))
    .expect("Keyless custom endpoint builds");
    assert_eq!(client.provider(), ProviderKind::OpenAiCompatible);
}
