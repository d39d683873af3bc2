//! Lock-free running statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use vellum_core::ModelStats;

/// Counters mutated by every finished attempt.
///
/// Each field is incremented with `fetch_add`, so concurrent outcomes for the
/// same model never lose an update.
#[derive(Debug, Default)]
pub struct AtomicStats {
    total_calls: AtomicU64,
    success_calls: AtomicU64,
    total_tokens: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl AtomicStats {
    /// Counters seeded from a persisted snapshot.
    pub fn from_snapshot(stats: &ModelStats) -> Self {
        Self {
            total_calls: AtomicU64::new(*stats.total_calls()),
            success_calls: AtomicU64::new(*stats.success_calls()),
            total_tokens: AtomicU64::new(*stats.total_tokens()),
            total_duration_ms: AtomicU64::new(*stats.total_duration_ms()),
        }
    }

    /// Add one finished attempt.
    pub fn record(&self, success: bool, tokens_used: u64, duration_ms: u64) {
        self.total_calls.fetch_add(1, Ordering::AcqRel);
        if success {
            self.success_calls.fetch_add(1, Ordering::AcqRel);
            self.total_tokens.fetch_add(tokens_used, Ordering::AcqRel);
        }
        self.total_duration_ms
            .fetch_add(duration_ms, Ordering::AcqRel);
    }

    /// Current values.
    pub fn snapshot(&self) -> ModelStats {
        ModelStats::new(
            self.total_calls.load(Ordering::Acquire),
            self.success_calls.load(Ordering::Acquire),
            self.total_tokens.load(Ordering::Acquire),
            self.total_duration_ms.load(Ordering::Acquire),
        )
    }
}
