pub mod config;
pub mod error;
pub mod latency;
pub mod observability;
pub mod pipeline;
pub mod readiness;
pub mod server;
pub mod tracer;
pub mod waveform;

pub use config::ServiceConfig;
pub use error::PipelineError;
pub use pipeline::{Task, TaskPipeline, TaskStore};
pub use server::{AppState, TaskServer};
pub use tracer::{SpanExporter, SpanRecord, StageTracer};
