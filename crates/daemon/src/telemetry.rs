//! Logging and optional OpenTelemetry export

use crate::settings::LogFormat;
use anyhow::Result;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "overseer=info";
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Install the global subscriber.
///
/// The returned guard flushes buffered log lines when dropped; keep it
/// alive until the process exits.
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: overseer=info)
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: Service name (default: overseer)
pub fn init(format: LogFormat) -> Result<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
    };
    let endpoint = std::env::var(OTLP_ENDPOINT_VAR).ok();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer(endpoint.as_deref())?)
        .try_init()?;

    match endpoint {
        None => debug!("OpenTelemetry not configured ({} not set)", OTLP_ENDPOINT_VAR),
        Some(endpoint) if cfg!(feature = "telemetry") => {
            info!(endpoint = %endpoint, "OpenTelemetry initialized successfully")
        }
        Some(_) => {
            warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
            warn!("Rebuild with: cargo build --features telemetry");
        }
    }
    Ok(guard)
}

#[cfg(feature = "telemetry")]
fn otel_layer<S>(
    endpoint: Option<&str>,
) -> Result<Option<tracing_opentelemetry::OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;

    let Some(endpoint) = endpoint else {
        return Ok(None);
    };
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "overseer".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(opentelemetry_sdk::Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
}

#[cfg(not(feature = "telemetry"))]
fn otel_layer(_endpoint: Option<&str>) -> Result<Option<tracing_subscriber::layer::Identity>> {
    Ok(None)
}
