//! Per-stage span recording.
//!
//! [`StageTracer::run_stage`] opens a [`SpanRecord`] when a stage starts and
//! hands it to every registered [`SpanExporter`] when the stage ends. The span
//! is finalized from a `Drop` guard, so it is emitted exactly once on success,
//! on error, and while unwinding from a panic.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub attributes: BTreeMap<String, Value>,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SpanRecord {
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at)
            .num_microseconds()
            .map(|us| us.max(0) as f64 / 1_000.0)
            .unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Receives finished spans. Delivery is fire-and-forget from the caller's side.
pub trait SpanExporter: Send + Sync {
    fn export(&self, span: SpanRecord);
}

/// Mutable attribute handle passed to a stage body.
#[derive(Debug, Default)]
pub struct SpanAttributes {
    values: BTreeMap<String, Value>,
}

impl SpanAttributes {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }
}

#[derive(Clone, Default)]
pub struct StageTracer {
    exporters: Vec<Arc<dyn SpanExporter>>,
}

impl StageTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn SpanExporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    /// Runs `work` inside a span named `name`. Errors are recorded on the span
    /// and returned to the caller untouched.
    pub fn run_stage<T, E, F>(&self, name: &str, work: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce(&mut SpanAttributes) -> Result<T, E>,
    {
        let mut guard = StageGuard::start(name, &self.exporters);
        let result = work(&mut guard.attributes);
        guard.outcome = Some(result.as_ref().err().map(ToString::to_string));
        result
    }
}

struct StageGuard<'a> {
    name: String,
    started_at: DateTime<Utc>,
    attributes: SpanAttributes,
    // None until the body returns; still None on drop means the body panicked.
    outcome: Option<Option<String>>,
    exporters: &'a [Arc<dyn SpanExporter>],
    emitted: bool,
}

impl<'a> StageGuard<'a> {
    fn start(name: &str, exporters: &'a [Arc<dyn SpanExporter>]) -> Self {
        Self {
            name: name.to_string(),
            started_at: Utc::now(),
            attributes: SpanAttributes::default(),
            outcome: None,
            exporters,
            emitted: false,
        }
    }

    fn emit(&mut self) {
        if self.emitted {
            return;
        }
        self.emitted = true;
        let error_message = match self.outcome.take() {
            Some(err) => err,
            None => Some("stage aborted".to_string()),
        };
        let record = SpanRecord {
            name: std::mem::take(&mut self.name),
            started_at: self.started_at,
            ended_at: Utc::now(),
            attributes: std::mem::take(&mut self.attributes.values),
            status: if error_message.is_some() {
                SpanStatus::Error
            } else {
                SpanStatus::Ok
            },
            error_message,
        };
        for exporter in self.exporters {
            exporter.export(record.clone());
        }
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        self.emit();
    }
}

/// Writes one structured log line per finished span.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExporter;

impl SpanExporter for LogExporter {
    fn export(&self, span: SpanRecord) {
        let attributes = serde_json::to_string(&span.attributes).unwrap_or_default();
        match span.status {
            SpanStatus::Ok => info!(
                stage = span.name.as_str(),
                duration_ms = span.duration_ms(),
                attributes = attributes.as_str(),
                "Stage completed"
            ),
            SpanStatus::Error => warn!(
                stage = span.name.as_str(),
                duration_ms = span.duration_ms(),
                attributes = attributes.as_str(),
                error = span.error_message.as_deref().unwrap_or_default(),
                "Stage failed"
            ),
        }
    }
}

/// Keeps every exported span in memory, in emission order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryExporter {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.spans().into_iter().map(|s| s.name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.spans.lock() {
            guard.clear();
        }
    }
}

impl SpanExporter for InMemoryExporter {
    fn export(&self, span: SpanRecord) {
        if let Ok(mut guard) = self.spans.lock() {
            guard.push(span);
        }
    }
}
