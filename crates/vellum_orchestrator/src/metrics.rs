//! Generation metrics.
//!
//! Available with the `metrics` feature.

#[cfg(feature = "metrics")]
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};

/// Counters and durations of generation units.
#[cfg(feature = "metrics")]
#[derive(Clone)]
pub struct GenerationMetrics {
    /// Meter handle kept alive for metric instruments
    _meter: Meter,
    /// Finished generation units
    pub attempts: Counter<u64>,
    /// Units that ended failed
    pub failures: Counter<u64>,
    /// Provider call duration in seconds
    pub duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl GenerationMetrics {
    /// Create instruments on the global meter.
    pub fn new() -> Self {
        let meter = global::meter("vellum_orchestrator");

        let attempts = meter
            .u64_counter("generation.attempts")
            .with_description("Finished generation units")
            .build();
        let failures = meter
            .u64_counter("generation.failures")
            .with_description("Generation units that failed")
            .build();
        let duration = meter
            .f64_histogram("generation.duration")
            .with_unit("seconds")
            .with_description("Provider call duration")
            .build();

        Self {
            _meter: meter,
            attempts,
            failures,
            duration,
        }
    }

    /// Record one finished unit.
    pub fn record(&self, model: &str, provider: &str, success: bool, duration_secs: f64) {
        let labels = [
            KeyValue::new("model", model.to_string()),
            KeyValue::new("provider", provider.to_string()),
        ];
        self.attempts.add(1, &labels);
        if !success {
            self.failures.add(1, &labels);
        }
        self.duration.record(duration_secs, &labels);
    }
}

#[cfg(feature = "metrics")]
impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
