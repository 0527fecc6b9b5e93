use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use crate::latency::{LatencySource, NoLatency, SleepLatency};
use crate::readiness::DEFAULT_WARM_UP_SECONDS;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "task-intake",
    version,
    about = "Instrumented task intake service with traced processing stages"
)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    #[arg(long, env = "TASK_INTAKE_LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// OTLP/gRPC collector endpoint; spans are only logged when unset
    #[arg(long, env = "OTEL_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// `service.name` resource attribute attached to exported spans
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "backendx")]
    pub service_name: String,

    /// Display name served by /api/config
    #[arg(long, env = "FIRSTNAME", default_value = "World")]
    pub firstname: String,

    /// Warm-up period in seconds before /api/ready reports ready
    #[arg(long, env = "TASK_INTAKE_READY_AFTER", default_value_t = DEFAULT_WARM_UP_SECONDS)]
    pub ready_after: f64,

    /// Skip the simulated per-stage latency
    #[arg(long)]
    pub no_latency: bool,
}

impl ServiceConfig {
    pub fn latency_source(&self) -> Arc<dyn LatencySource> {
        if self.no_latency {
            Arc::new(NoLatency)
        } else {
            Arc::new(SleepLatency)
        }
    }

    /// Endpoint with an `http://` scheme added when the value is a bare host:port.
    pub fn otlp_endpoint(&self) -> Option<String> {
        let endpoint = self.otel_endpoint.as_deref()?.trim();
        if endpoint.is_empty() {
            return None;
        }
        if endpoint.contains("://") {
            Some(endpoint.to_string())
        } else {
            Some(format!("http://{endpoint}"))
        }
    }
}
