//! Logging and optional OpenTelemetry export.
//!
//! A fmt subscriber filtered by `[telemetry] log_level` is always installed.
//! With an OTLP endpoint configured, session and delivery spans plus log
//! events are also shipped over gRPC.

use std::time::Duration;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::logs::{BatchLogProcessor, SdkLoggerProvider};
use opentelemetry_sdk::trace::{BatchSpanProcessor, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pulseconf::TelemetryConfig;

/// Exports give up after this long so a dead collector never stalls a session.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

const SERVICE_NAME: &str = "pulsewire";

/// Install the global subscriber. Call once, from the binary.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let filter = log_filter(&config.log_level)?;
    let fmt = tracing_subscriber::fmt::layer().with_target(false);

    if !config.otlp_enabled() {
        tracing_subscriber::registry().with(filter).with(fmt).init();
        return Ok(());
    }

    let endpoint = collector_url(&config.otlp_endpoint);
    let resource = resource();

    let tracer_provider = tracer_provider(&endpoint, resource.clone())?;
    let tracer = tracer_provider.tracer(SERVICE_NAME);
    opentelemetry::global::set_tracer_provider(tracer_provider);

    let logger_provider = logger_provider(&endpoint, resource)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(OpenTelemetryTracingBridge::new(&logger_provider))
        .init();

    tracing::info!(otlp.endpoint = %endpoint, "Exporting traces and logs");
    Ok(())
}

/// Filter from the configured level, falling back to `info` when it does
/// not parse.
fn log_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to build log filter")
}

/// Collectors are often configured as bare `host:port`; tonic needs a scheme.
fn collector_url(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

fn resource() -> Resource {
    Resource::builder_empty()
        .with_service_name(SERVICE_NAME)
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build()
}

fn tracer_provider(endpoint: &str, resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_span_processor(BatchSpanProcessor::builder(exporter).build())
        .with_resource(resource)
        .build())
}

fn logger_provider(endpoint: &str, resource: Resource) -> Result<SdkLoggerProvider> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP log exporter")?;

    Ok(SdkLoggerProvider::builder()
        .with_log_processor(BatchLogProcessor::builder(exporter).build())
        .with_resource(resource)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_url_adds_scheme() {
        assert_eq!(collector_url("otel:4317"), "http://otel:4317");
        assert_eq!(collector_url("http://otel:4317"), "http://otel:4317");
        assert_eq!(collector_url("https://otel:4317"), "https://otel:4317");
    }

    #[test]
    fn test_log_filter_accepts_directives() {
        assert!(log_filter("pulsewire=debug,reqwest=warn").is_ok());
    }

    #[test]
    fn test_log_filter_falls_back_on_garbage() {
        assert!(log_filter("pulsewire=[[[").is_ok());
    }
}
