use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::ServiceConfig;

#[cfg(feature = "otel")]
pub mod otel;

/// Installs the global subscriber. Returns whether spans are being exported
/// over OTLP.
pub fn init_tracing(config: &ServiceConfig) -> Result<bool> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(feature = "otel")]
    {
        let otel_layer = match config.otlp_endpoint() {
            Some(endpoint) => {
                let tracer = otel::install_pipeline(&config.service_name, &endpoint)?;
                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            }
            None => None,
        };
        let exporting = otel_layer.is_some();

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(otel_layer)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
        Ok(exporting)
    }

    #[cfg(not(feature = "otel"))]
    {
        if let Some(endpoint) = config.otlp_endpoint() {
            eprintln!(
                "warning: OTLP endpoint '{}' configured but OpenTelemetry support is not enabled. Rebuild with --features otel.",
                endpoint
            );
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
        Ok(false)
    }
}

pub fn shutdown() {
    #[cfg(feature = "otel")]
    otel::shutdown();
}
