//! Tests for lifecycle rules, aggregation and wire formats of core types.

use std::str::FromStr;
use vellum_core::{
    BatchStatus, Credentials, ModelConfig, ModelId, ModelStats, ProgressEvent, ProgressStage,
    ProposalId, ProviderKind, Rating, VersionStatus,
};

#[test]
fn test_terminal_statuses_have_no_transitions() {
    for terminal in [VersionStatus::Completed, VersionStatus::Failed] {
        for next in [
            VersionStatus::Pending,
            VersionStatus::Generating,
            VersionStatus::Completed,
            VersionStatus::Failed,
        ] {
            assert!(!terminal.can_transition_to(next));
        }
    }
    assert!(!VersionStatus::Generating.can_transition_to(VersionStatus::Pending));
    assert!(!VersionStatus::Pending.can_transition_to(VersionStatus::Completed));
}

#[test]
fn test_batch_aggregate() {
    use VersionStatus::*;
    assert_eq!(BatchStatus::aggregate(Vec::<VersionStatus>::new()), None);
    assert_eq!(
        BatchStatus::aggregate([Completed, Generating]),
        Some(BatchStatus::InProgress)
    );
    assert_eq!(
        BatchStatus::aggregate([Pending, Failed]),
        Some(BatchStatus::InProgress)
    );
    assert_eq!(
        BatchStatus::aggregate([Completed, Completed]),
        Some(BatchStatus::Completed)
    );
    assert_eq!(
        BatchStatus::aggregate([Failed, Failed, Failed]),
        Some(BatchStatus::Failed)
    );
    assert_eq!(
        BatchStatus::aggregate([Completed, Failed, Completed]),
        Some(BatchStatus::Partial)
    );
}

#[test]
fn test_status_string_forms() {
    assert_eq!(VersionStatus::Generating.to_string(), "generating");
    assert_eq!(
        VersionStatus::from_str("completed").expect("Valid status"),
        VersionStatus::Completed
    );
    assert_eq!(BatchStatus::InProgress.to_string(), "in_progress");
    assert_eq!(ProviderKind::OpenAiCompatible.to_string(), "openai_compatible");
    assert_eq!(ProviderKind::DeepSeek.to_string(), "deepseek");
    assert_eq!(
        ProviderKind::from_str("openai").expect("Valid provider"),
        ProviderKind::OpenAi
    );
    let json = serde_json::to_string(&ProviderKind::DeepSeek).expect("Serializes");
    assert_eq!(json, "\"deepseek\"");
}

#[test]
fn test_rating_deserialization_validates_range() {
    let ok: Rating = serde_json::from_str("5").expect("Valid rating");
    assert_eq!(ok.value(), 5);
    assert!(serde_json::from_str::<Rating>("0").is_err());
    assert!(serde_json::from_str::<Rating>("9").is_err());
}

#[test]
fn test_success_rate() {
    assert_eq!(ModelStats::default().success_rate(), 0.0);
    let stats = ModelStats::new(4, 3, 1200, 8000);
    assert!((stats.success_rate() - 0.75).abs() < f64::EPSILON);
    assert_eq!(stats.average_duration_ms(), Some(2000.0));
}

#[test]
fn test_inline_credentials_take_precedence() {
    let creds = Credentials {
        api_key: Some("sk-inline".to_string()),
        api_key_env: Some("VELLUM_TEST_UNSET_KEY".to_string()),
    };
    assert_eq!(creds.resolve(None).as_deref(), Some("sk-inline"));
    assert!(!format!("{:?}", creds).contains("sk-inline"));
    assert_eq!(Credentials::from_env("VELLUM_TEST_UNSET_KEY").resolve(None), None);
}

#[test]
fn test_model_config_from_toml() {
    let config: ModelConfig = toml::from_str(
        r#"
        id = 3
        name = "Kimi"
        provider = "moonshot"
        model_name = "moonshot-v1-8k"

        [params]
        temperature = 0.3
        timeout_secs = 30

        [limits]
        max_concurrent = 2
        "#,
    )
    .expect("Valid model config");
    assert_eq!(*config.id(), ModelId(3));
    assert_eq!(*config.params().timeout_secs(), 30);
    assert_eq!(*config.params().max_retries(), 3);
    assert_eq!(*config.limits().max_concurrent(), Some(2));
    assert!(*config.enabled());
    assert!(!*config.is_default());
    assert_eq!(config.effective_base_url(), Some("https://api.moonshot.cn/v1"));
}

#[test]
fn test_progress_event_wire_format() {
    let event = ProgressEvent::new(ProposalId(11), ProgressStage::Connecting, 0, "queued");
    let value = serde_json::to_value(&event).expect("Serializes");
    assert_eq!(value["proposal_id"], 11);
    assert_eq!(value["stage"], "connecting");
    assert!(value.get("batch_id").is_none());
}
