//! Retry policy behavior against scripted adapters and a mock server.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use vellum_core::{GenerationOutput, GenerationParams, ProviderKind};
use vellum_error::{ProviderError, ProviderErrorKind};
use vellum_interface::ProviderAdapter;
use vellum_models::{OpenAiCompatibleClient, RetryPolicy, generate_with_retry};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Adapter replaying a fixed list of outcomes, one per call.
struct ScriptedAdapter {
    outcomes: Mutex<VecDeque<Result<GenerationOutput, ProviderErrorKind>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    fn new(outcomes: Vec<Result<GenerationOutput, ProviderErrorKind>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
        _timeout: Duration,
    ) -> Result<GenerationOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.outcomes.lock().expect("Lock").pop_front();
        match next {
            Some(Ok(output)) => Ok(output),
            Some(Err(kind)) => Err(ProviderError::new(kind)),
            None => Ok(GenerationOutput::new("default".to_string(), 1)),
        }
    }
}

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        backoff_multiplier: 2.0,
    }
}

fn rejected(status: u16) -> ProviderErrorKind {
    ProviderErrorKind::Rejected {
        status,
        message: "busy".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_are_retried() {
    let adapter = ScriptedAdapter::new(vec![
        Err(rejected(503)),
        Err(ProviderErrorKind::Network("reset".to_string())),
        Ok(GenerationOutput::new("third time".to_string(), 9)),
    ]);

    let output = generate_with_retry(&adapter, "p", &GenerationParams::default(), &fast_policy(3))
        .await
        .expect("Third attempt succeeds");

    assert_eq!(output.content, "third time");
    assert_eq!(adapter.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_short_circuits() {
    let adapter = ScriptedAdapter::new(vec![
        Err(ProviderErrorKind::Unauthorized("bad key".to_string())),
        Ok(GenerationOutput::new("never".to_string(), 1)),
    ]);

    let err = generate_with_retry(&adapter, "p", &GenerationParams::default(), &fast_policy(5))
        .await
        .expect_err("Unauthorized is final");

    assert!(matches!(err.kind, ProviderErrorKind::Unauthorized(_)));
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_returns_last_error() {
    let adapter = ScriptedAdapter::new(vec![
        Err(rejected(500)),
        Err(rejected(502)),
        Err(rejected(429)),
    ]);

    let err = generate_with_retry(&adapter, "p", &GenerationParams::default(), &fast_policy(2))
        .await
        .expect_err("All attempts fail");

    assert!(matches!(err.kind, ProviderErrorKind::Rejected { status: 429, .. }));
    assert_eq!(adapter.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_sleeps_follow_policy_backoff_curve() {
    let adapter = ScriptedAdapter::new(vec![
        Err(rejected(503)),
        Err(rejected(503)),
        Err(rejected(503)),
        Err(rejected(503)),
        Ok(GenerationOutput::new("fifth".to_string(), 1)),
    ]);
    let policy = fast_policy(4);

    let started = tokio::time::Instant::now();
    generate_with_retry(&adapter, "p", &GenerationParams::default(), &policy)
        .await
        .expect("Fifth attempt succeeds");

    let expected: Duration = (1..=4).map(|retry| policy.backoff_for(retry)).sum();
    // 10ms, 20ms, then capped at 40ms twice
    assert_eq!(expected, Duration::from_millis(110));
    assert_eq!(started.elapsed(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_each_attempt_is_bounded_by_timeout() {
    let adapter = ScriptedAdapter::slow(Duration::from_secs(60));
    let params = GenerationParams::builder()
        .timeout_secs(2u64)
        .build()
        .expect("Valid params");

    let started = tokio::time::Instant::now();
    let err = generate_with_retry(&adapter, "p", &params, &fast_policy(1))
        .await
        .expect_err("Both attempts time out");

    assert!(matches!(err.kind, ProviderErrorKind::Timeout { after_ms: 2000 }));
    assert_eq!(adapter.calls(), 2);
    // Two 2s attempts plus one 10ms backoff
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_retry_recovers_from_http_503() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "recovered" } }],
            "usage": { "total_tokens": 7 }
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let client =
        OpenAiCompatibleClient::new(None, "m", &server.uri(), ProviderKind::OpenAiCompatible);
    let output = generate_with_retry(&client, "p", &GenerationParams::default(), &fast_policy(2))
        .await
        .expect("Second attempt succeeds");

    assert_eq!(output.content, "recovered");
    assert_eq!(output.tokens_used, 7);
    assert_eq!(server.received_requests().await.expect("Recording").len(), 2);
}
