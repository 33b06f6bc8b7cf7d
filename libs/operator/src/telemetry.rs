//! Logging and distributed tracing setup, performed once at startup.
//!
//! `LogFormat::Text` is for local development; `LogFormat::Json` is for
//! production log shipping. The OpenTelemetry layer is only attached when an
//! endpoint is configured — the reconciler runs fine without a collector.

use std::fmt;

use opentelemetry::trace::{TraceContextExt, TracerProvider};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{Error, Result};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Initializes the global `tracing` subscriber.
///
/// `tracing_url` is the OTLP collector endpoint; when `None`, spans are still
/// emitted as logs but never exported.
pub async fn init(log_filter: &str, log_format: LogFormat, tracing_url: Option<&str>, sample_ratio: f64) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_filter)
        .map_err(|e| Error::FormattingError("invalid log filter directive".into(), fmt_error(e)))?;

    let fmt_layer = match log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().flatten_event(true).boxed(),
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    let result = match tracing_url {
        Some(url) => {
            let tracer = init_tracer(url, sample_ratio)?;
            registry.with(tracing_opentelemetry::layer().with_tracer(tracer)).try_init()
        }
        None => registry.try_init(),
    };

    result.map_err(|e| Error::FormattingError("failed to install tracing subscriber".into(), fmt_error(e)))
}

fn init_tracer(url: &str, sample_ratio: f64) -> Result<opentelemetry_sdk::trace::Tracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()
        .map_err(|e| Error::FormattingError("failed to build OTLP exporter".into(), fmt_error(e)))?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(sample_ratio))
        .with_resource(Resource::builder().with_attribute(KeyValue::new("service.name", "kaniop-netctl")).build())
        .build();

    let tracer = provider.tracer("kaniop-netctl");
    opentelemetry::global::set_tracer_provider(provider);
    Ok(tracer)
}

/// Hex-encoded trace ID for the current span, used to correlate a log line
/// with a trace in the configured collector.
pub fn get_trace_id() -> Result<String> {
    let context = Span::current().context();
    let trace_id = context.span().span_context().trace_id();
    if trace_id == opentelemetry::trace::TraceId::INVALID {
        return Err(Error::InvalidTraceId);
    }
    Ok(trace_id.to_string())
}

fn fmt_error<E: std::error::Error>(e: E) -> std::fmt::Error {
    tracing::error!(error = %e, "telemetry init failure");
    std::fmt::Error
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn log_format_displays_clap_value_names() {
        assert_eq!(LogFormat::Text.to_string(), "text");
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn trace_id_absent_without_a_span() {
        assert!(matches!(get_trace_id(), Err(Error::InvalidTraceId)));
    }
}
