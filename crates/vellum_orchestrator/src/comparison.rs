//! Side-by-side view of several versions.

use crate::orchestrator::Orchestrator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use vellum_core::{ModelId, ProposalVersion, ProviderKind, VersionId, VersionStatus};
use vellum_error::{ValidationError, VellumResult};

/// One version as shown in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedVersion {
    /// Version identifier
    pub version_id: VersionId,
    /// Version number within its proposal
    pub version_number: i32,
    /// Model used
    pub model_id: ModelId,
    /// Model display name
    pub model_name: String,
    /// Provider family
    pub provider: ProviderKind,
    /// Lifecycle status
    pub status: VersionStatus,
    /// Whether generation succeeded
    pub success: bool,
    /// Parsed summary
    pub summary: Option<String>,
    /// Parsed solution overview
    pub solution_overview: Option<String>,
    /// Raw generated text
    pub full_content: Option<String>,
    /// Error summary for failed versions
    pub error: Option<String>,
    /// User rating
    pub rating: Option<u8>,
    /// Selected flag
    pub selected: bool,
    /// Tokens consumed
    pub tokens_used: Option<u64>,
    /// Generation duration in milliseconds
    pub duration_ms: Option<u64>,
    /// Current success rate of the model, when it is still registered
    pub model_success_rate: Option<f64>,
}

impl ComparedVersion {
    fn new(version: ProposalVersion, model_success_rate: Option<f64>) -> Self {
        let (summary, solution_overview, full_content) = match version.content {
            Some(content) => (
                Some(content.summary),
                Some(content.solution_overview),
                Some(content.full_content),
            ),
            None => (None, None, None),
        };
        Self {
            version_id: version.id,
            version_number: version.version_number,
            model_id: version.model_id,
            model_name: version.model_name,
            provider: version.provider,
            success: version.status == VersionStatus::Completed,
            status: version.status,
            summary,
            solution_overview,
            full_content,
            error: version.error,
            rating: version.rating.map(|r| r.value()),
            selected: version.selected,
            tokens_used: version.tokens_used,
            duration_ms: version.duration_ms,
            model_success_rate,
        }
    }
}

/// Aggregates over the compared versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    /// Number of versions compared
    pub total_versions: usize,
    /// `provider(model)` labels in request order
    pub models_used: Vec<String>,
    /// Versions per status
    pub status_distribution: BTreeMap<String, usize>,
    /// Mean tokens, counting missing values as zero
    pub average_tokens: u64,
    /// Mean duration in milliseconds, counting missing values as zero
    pub average_duration_ms: u64,
    /// Lowest and highest version number, as `vA - vB`
    pub version_range: String,
}

impl ComparisonSummary {
    fn from_versions(versions: &[ComparedVersion]) -> Self {
        let total = versions.len();
        let mut status_distribution = BTreeMap::new();
        for version in versions {
            *status_distribution
                .entry(version.status.to_string())
                .or_insert(0) += 1;
        }
        let divisor = total.max(1) as u64;
        let tokens: u64 = versions.iter().filter_map(|v| v.tokens_used).sum();
        let duration: u64 = versions.iter().filter_map(|v| v.duration_ms).sum();
        let low = versions.iter().map(|v| v.version_number).min().unwrap_or(0);
        let high = versions.iter().map(|v| v.version_number).max().unwrap_or(0);

        Self {
            total_versions: total,
            models_used: versions
                .iter()
                .map(|v| format!("{}({})", v.provider, v.model_name))
                .collect(),
            status_distribution,
            average_tokens: tokens / divisor,
            average_duration_ms: duration / divisor,
            version_range: format!("v{} - v{}", low, high),
        }
    }
}

/// Text similarity of two completed versions, from 0 (disjoint) to 1 (identical).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEntry {
    /// First version
    pub left: VersionId,
    /// Second version
    pub right: VersionId,
    /// Sørensen-Dice coefficient over character bigrams
    pub score: f64,
}

/// Result of [`Orchestrator::compare`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Versions in request order
    pub versions: Vec<ComparedVersion>,
    /// Aggregates
    pub summary: ComparisonSummary,
    /// One entry per pair of completed versions
    pub similarity: Vec<SimilarityEntry>,
}

fn similarity(versions: &[ComparedVersion]) -> Vec<SimilarityEntry> {
    let completed: Vec<(VersionId, &str)> = versions
        .iter()
        .filter_map(|v| v.full_content.as_deref().map(|c| (v.version_id, c)))
        .collect();
    let mut entries = Vec::new();
    for (i, (left, left_text)) in completed.iter().enumerate() {
        for (right, right_text) in &completed[i + 1..] {
            entries.push(SimilarityEntry {
                left: *left,
                right: *right,
                score: strsim::sorensen_dice(left_text, right_text),
            });
        }
    }
    entries
}

impl Orchestrator {
    /// Compare between two and `max_compare` versions.
    ///
    /// Any mix of statuses is accepted; versions may come from different
    /// proposals.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn compare(&self, ids: &[VersionId]) -> VellumResult<ComparisonReport> {
        let max = *self.engine().settings.max_compare();
        if ids.len() < 2 || ids.len() > max {
            return Err(ValidationError::new(format!(
                "Comparison needs between 2 and {} versions, got {}",
                max,
                ids.len()
            ))
            .into());
        }

        let loaded = self.engine().store.get_versions(ids).await?;
        let mut versions = Vec::with_capacity(loaded.len());
        for version in loaded {
            let rate = self
                .engine()
                .registry
                .stats(version.model_id)
                .await
                .ok()
                .map(|s| s.success_rate());
            versions.push(ComparedVersion::new(version, rate));
        }

        let summary = ComparisonSummary::from_versions(&versions);
        let similarity = similarity(&versions);
        Ok(ComparisonReport {
            versions,
            summary,
            similarity,
        })
    }
}
