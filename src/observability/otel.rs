use std::borrow::Cow;
use std::time::SystemTime;

use anyhow::{Context, Result};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{Span, Status, Tracer};
use opentelemetry::{KeyValue, Value as OtelValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{resource::Resource, runtime, trace as sdktrace};
use serde_json::Value;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::tracer::{SpanExporter, SpanRecord, SpanStatus};

const INSTRUMENTATION_NAME: &str = "task-intake";

/// Installs a batching OTLP/gRPC pipeline as the global tracer provider.
pub fn install_pipeline(service_name: &str, endpoint: &str) -> Result<sdktrace::Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            sdktrace::Config::default().with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                service_name.to_string(),
            )])),
        )
        .install_batch(runtime::Tokio)
        .with_context(|| format!("Failed to install OTLP pipeline for {endpoint}"))
}

pub fn shutdown() {
    global::shutdown_tracer_provider();
}

/// Replays finished stage spans into an OpenTelemetry tracer, as children of
/// whatever tracing span is current on the exporting thread.
#[derive(Debug)]
pub struct OtlpExporter<T = BoxedTracer> {
    tracer: T,
}

impl OtlpExporter {
    /// Exports through the globally installed tracer provider.
    pub fn global() -> Self {
        Self::new(global::tracer(INSTRUMENTATION_NAME))
    }
}

impl<T> OtlpExporter<T> {
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }
}

impl<T> SpanExporter for OtlpExporter<T>
where
    T: Tracer + Send + Sync,
{
    fn export(&self, record: SpanRecord) {
        let parent = tracing::Span::current().context();
        let attributes: Vec<KeyValue> = record
            .attributes
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), to_otel_value(value)))
            .collect();

        let builder = self
            .tracer
            .span_builder(record.name.clone())
            .with_start_time(SystemTime::from(record.started_at))
            .with_attributes(attributes);
        let mut span = self.tracer.build_with_context(builder, &parent);
        match record.status {
            SpanStatus::Ok => span.set_status(Status::Ok),
            SpanStatus::Error => span.set_status(Status::error(Cow::Owned(
                record.error_message.clone().unwrap_or_default(),
            ))),
        }
        span.end_with_timestamp(SystemTime::from(record.ended_at));
    }
}

fn to_otel_value(value: &Value) -> OtelValue {
    match value {
        Value::Bool(b) => OtelValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => OtelValue::I64(i),
            None => OtelValue::F64(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => OtelValue::String(s.clone().into()),
        other => OtelValue::String(other.to_string().into()),
    }
}
