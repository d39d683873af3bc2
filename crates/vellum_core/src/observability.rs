//! Tracing subscriber and OpenTelemetry metrics initialization.

#[cfg(feature = "metrics")]
use opentelemetry::KeyValue;
#[cfg(feature = "metrics")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Returns an error
/// if a subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| format!("Failed to install tracing subscriber: {}", e))?;
    debug!(%format, "Tracing subscriber installed");
    Ok(())
}

/// Destination of exported generation metrics.
///
/// # Examples
///
/// ```
/// use vellum_core::MetricsExporter;
///
/// let exporter: MetricsExporter = "otlp".parse().unwrap();
/// assert_eq!(exporter, MetricsExporter::Otlp);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MetricsExporter {
    /// Print periodic snapshots to stdout
    #[default]
    Stdout,
    /// Push over OTLP/HTTP to `OTEL_EXPORTER_OTLP_ENDPOINT`
    Otlp,
}

impl MetricsExporter {
    /// Exporter named by `OTEL_EXPORTER`, stdout when unset or unknown.
    pub fn from_env() -> Self {
        match std::env::var("OTEL_EXPORTER") {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                warn!(value = %value, "Unknown OTEL_EXPORTER, using stdout");
                Self::Stdout
            }),
            Err(_) => Self::Stdout,
        }
    }
}

/// Owns the installed meter provider until [`MetricsGuard::shutdown`].
///
/// Without the `metrics` feature the guard is empty.
#[derive(Debug, Default)]
pub struct MetricsGuard {
    #[cfg(feature = "metrics")]
    provider: Option<SdkMeterProvider>,
}

impl MetricsGuard {
    /// Flush pending measurements and stop the periodic reader.
    #[instrument(skip(self))]
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Some(provider) = self.provider
                && let Err(e) = provider.shutdown()
            {
                warn!(error = %e, "Meter provider shutdown failed");
            }
        }
        info!("Metrics shut down");
    }
}

/// Install the global meter provider for `service_name`.
///
/// The exporter is chosen by [`MetricsExporter::from_env`]. Measurements are
/// collected every `export_interval`. When the `metrics` feature is disabled
/// nothing is installed and an empty guard is returned.
#[instrument(skip_all, fields(service_name))]
pub fn init_observability(
    service_name: &'static str,
    export_interval: Duration,
) -> Result<MetricsGuard, String> {
    let exporter = MetricsExporter::from_env();

    #[cfg(not(feature = "metrics"))]
    {
        debug!(service_name, %exporter, ?export_interval, "Metrics feature disabled");
        Ok(MetricsGuard::default())
    }

    #[cfg(feature = "metrics")]
    {
        let reader = match exporter {
            MetricsExporter::Otlp => {
                let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:4318".to_string());
                let otlp = opentelemetry_otlp::MetricExporter::builder()
                    .with_http()
                    .with_endpoint(&endpoint)
                    .with_timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|e| format!("Failed to create OTLP exporter: {}", e))?;
                info!(endpoint = %endpoint, "Exporting metrics over OTLP");
                PeriodicReader::builder(otlp)
                    .with_interval(export_interval)
                    .build()
            }
            MetricsExporter::Stdout => {
                PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
                    .with_interval(export_interval)
                    .build()
            }
        };

        let provider = SdkMeterProvider::builder()
            .with_resource(
                Resource::builder_empty()
                    .with_attributes([KeyValue::new("service.name", service_name)])
                    .build(),
            )
            .with_reader(reader)
            .build();
        opentelemetry::global::set_meter_provider(provider.clone());
        info!(%exporter, ?export_interval, "Metrics initialized");
        Ok(MetricsGuard {
            provider: Some(provider),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_names() {
        assert_eq!("stdout".parse::<MetricsExporter>().unwrap(), MetricsExporter::Stdout);
        assert_eq!("OTLP".parse::<MetricsExporter>().unwrap(), MetricsExporter::Otlp);
        assert!("prometheus".parse::<MetricsExporter>().is_err());
        assert_eq!(MetricsExporter::Otlp.to_string(), "otlp");
    }

    #[test]
    fn test_log_format_names() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
