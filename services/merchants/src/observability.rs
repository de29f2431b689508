//! Logging, tracing and metrics for the merchant service.
//!
//! # Purpose
//! Installs the `tracing` subscriber (env-filtered fmt output, plus span export
//! over OTLP when `OTEL_EXPORTER_OTLP_ENDPOINT` is set), the W3C trace-context
//! propagator read by the request span, and the Prometheus recorder rendered
//! on the `/metrics` listener.
//!
//! # Metrics
//! - `merchants_total` (gauge): records currently stored.
//! - `merchants_changes_total{op}` (counter): `created`, `updated`, `deleted`.
//! - `merchants_exports_total{format}` (counter): `csv`, `json`.
//!
//! # Notes
//! Every installer runs at most once per process; later calls reuse the first
//! result.
use anyhow::Context;
use axum::Router;
use axum::http::HeaderMap;
use axum::routing::get;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const INSTANCE_ID_ENV: &str = "MERCHANTS_SERVICE_INSTANCE_ID";

const GAUGES: &[(&str, &str)] = &[("merchants_total", "Merchant records currently stored.")];

const COUNTERS: &[(&str, &str)] = &[
    (
        "merchants_changes_total",
        "Merchant writes, labelled by op (created, updated, deleted).",
    ),
    (
        "merchants_exports_total",
        "Exports served, labelled by format (csv, json).",
    ),
];

static SUBSCRIBER: OnceLock<()> = OnceLock::new();
static PROPAGATOR: OnceLock<()> = OnceLock::new();
static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install logging, tracing and the metrics recorder for `service_name`.
pub fn init_observability(service_name: &str) -> anyhow::Result<PrometheusHandle> {
    SUBSCRIBER.get_or_init(|| install_subscriber(service_name));
    let handle = prometheus_handle()?;
    for (name, help) in GAUGES {
        metrics::describe_gauge!(*name, *help);
    }
    for (name, help) in COUNTERS {
        metrics::describe_counter!(*name, *help);
    }
    Ok(handle)
}

fn install_subscriber(service_name: &str) {
    install_propagator();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let otel = otlp_provider(service_name).map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel)
        .try_init();
}

fn install_propagator() {
    PROPAGATOR.get_or_init(|| global::set_text_map_propagator(TraceContextPropagator::new()));
}

fn otlp_provider(service_name: &str) -> Option<SdkTracerProvider> {
    std::env::var_os(OTLP_ENDPOINT_ENV)?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .ok()?;
    let resource = Resource::builder_empty()
        .with_attributes(resource_attributes(service_name))
        .build();
    Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build(),
    )
}

fn resource_attributes(service_name: &str) -> Vec<KeyValue> {
    let mut attrs = vec![KeyValue::new("service.name", service_name.to_string())];
    if let Some(instance) = instance_id() {
        attrs.push(KeyValue::new("service.instance.id", instance));
    }
    attrs
}

fn instance_id() -> Option<String> {
    std::env::var(INSTANCE_ID_ENV)
        .or_else(|_| std::env::var("HOSTNAME"))
        .ok()
        .filter(|value| !value.is_empty())
}

fn prometheus_handle() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = RECORDER.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("install metrics recorder")?;
    Ok(RECORDER.get_or_init(|| handle).clone())
}

/// Parent context carried by `traceparent`/`tracestate` request headers.
pub fn trace_context_from_headers(headers: &HeaderMap) -> opentelemetry::Context {
    install_propagator();
    global::get_text_map_propagator(|propagator| propagator.extract(&RequestHeaders(headers)))
}

struct RequestHeaders<'a>(&'a HeaderMap);

impl Extractor for RequestHeaders<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

/// Serve `/metrics` on `addr` until the task is dropped.
pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, metrics_router(handle).into_make_service()).await
}
