use anyhow::Result;
use clap::Parser;
use task_intake::readiness::ProcessClock;
use task_intake::{AppState, ServiceConfig, TaskServer, observability};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let started_at = ProcessClock::global().started_at();
    let config = ServiceConfig::parse();

    let otlp_exporting = observability::init_tracing(&config)?;
    if config.otel_endpoint.is_none() {
        warn!("OTEL_ENDPOINT not set; stage spans are only logged");
    }
    info!(
        started_at,
        ready_after = config.ready_after,
        otlp_exporting,
        no_latency = config.no_latency,
        "Starting task intake service"
    );

    let state = AppState::from_config(&config, otlp_exporting);
    let result = match TaskServer::bind(config.listen, state) {
        Ok(server) => server.run(shutdown_signal()).await,
        Err(err) => Err(err),
    };

    observability::shutdown();
    result
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
