//! One generation unit: a single version produced by a single model.

use crate::orchestrator::Engine;
use crate::prompt::render_prompt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use vellum_core::{ProgressEvent, ProgressStage, ProposalVersion, VersionStatus, parse_content};
use vellum_error::VellumResult;
use vellum_interface::VersionCompletion;
use vellum_models::generate_with_retry;
use vellum_registry::ResolvedModel;

/// Finished-unit counter shared by the units of one batch.
#[derive(Debug)]
pub(crate) struct Tally {
    total: usize,
    finished: AtomicUsize,
}

impl Tally {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            finished: AtomicUsize::new(0),
        }
    }

    fn progress(&self, finished: usize) -> u8 {
        let span = 90 * finished / self.total.max(1);
        u8::try_from(5 + span).unwrap_or(100)
    }

    fn current(&self) -> u8 {
        self.progress(self.finished.load(Ordering::Acquire))
    }

    fn finish(&self) -> usize {
        self.finished.fetch_add(1, Ordering::AcqRel) + 1
    }
}

fn millis(elapsed: std::time::Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Run one unit to a terminal status and report it.
#[instrument(
    skip_all,
    fields(
        proposal_id = %version.proposal_id,
        batch_id = %version.batch_id,
        version_id = %version.id,
        model_id = %version.model_id
    )
)]
pub(crate) async fn run_unit(
    engine: Arc<Engine>,
    version: ProposalVersion,
    model: ResolvedModel,
    tally: Arc<Tally>,
) -> VersionStatus {
    let status = match generate(&engine, &version, &model, &tally).await {
        Ok(status) => status,
        Err(err) => {
            error!(error = %err, "Generation unit could not record its outcome");
            VersionStatus::Failed
        }
    };

    publish_finished(&engine, &version, status, &tally).await;
    status
}

/// Account for a unit whose task died before reporting: count the attempt
/// as failed and publish its finish.
pub(crate) async fn report_aborted(engine: &Engine, version: &ProposalVersion, tally: &Tally) {
    engine.record_outcome(version.model_id, false, 0, 0).await;
    publish_finished(engine, version, VersionStatus::Failed, tally).await;
}

async fn publish_finished(
    engine: &Engine,
    version: &ProposalVersion,
    status: VersionStatus,
    tally: &Tally,
) {
    let finished = tally.finish();
    let message = format!(
        "{} {} ({}/{})",
        version.model_name, status, finished, tally.total
    );
    engine
        .publish(
            ProgressEvent::new(
                version.proposal_id,
                ProgressStage::Processing,
                tally.progress(finished),
                message,
            )
            .with_batch(version.batch_id)
            .with_version(version.id),
        )
        .await;
}

async fn generate(
    engine: &Engine,
    version: &ProposalVersion,
    model: &ResolvedModel,
    tally: &Tally,
) -> VellumResult<VersionStatus> {
    let _admission = match model.limiter().acquire().await {
        Ok(guard) => guard,
        Err(err) => {
            engine
                .store
                .fail_version(version.id, err.to_string(), None)
                .await?;
            return Ok(VersionStatus::Failed);
        }
    };

    engine.store.mark_generating(version.id).await?;
    engine
        .publish(
            ProgressEvent::new(
                version.proposal_id,
                ProgressStage::Generating,
                tally.current(),
                format!("Generating with {}", version.model_name),
            )
            .with_batch(version.batch_id)
            .with_version(version.id),
        )
        .await;

    let params = model.config().params();
    let policy = engine
        .settings
        .retry()
        .clone()
        .with_max_retries(*params.max_retries());
    let prompt = render_prompt(&version.request);
    let started = Instant::now();
    let result = generate_with_retry(model.adapter().as_ref(), &prompt, params, &policy).await;
    let duration_ms = millis(started.elapsed());

    #[cfg(feature = "metrics")]
    engine.metrics.record(
        &version.model_name,
        version.provider.as_ref(),
        result.is_ok(),
        duration_ms as f64 / 1000.0,
    );

    match result {
        Ok(output) => {
            let content = parse_content(&output.content);
            engine
                .store
                .complete_version(
                    version.id,
                    VersionCompletion::new(content, output.tokens_used, duration_ms),
                )
                .await?;
            engine.record_outcome(version.model_id, true, output.tokens_used, duration_ms).await;
            info!(tokens = output.tokens_used, duration_ms, "Version completed");
            Ok(VersionStatus::Completed)
        }
        Err(err) => {
            warn!(error = %err, duration_ms, "Provider call failed");
            engine
                .store
                .fail_version(version.id, err.summary(), Some(duration_ms))
                .await?;
            engine.record_outcome(version.model_id, false, 0, duration_ms).await;
            Ok(VersionStatus::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_spans_five_to_ninety_five() {
        let tally = Tally::new(3);
        assert_eq!(tally.progress(0), 5);
        assert_eq!(tally.progress(1), 35);
        assert_eq!(tally.progress(3), 95);
    }
}
