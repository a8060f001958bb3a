use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use testrun::cli::ServiceArgs;
use testrun::server::{self, AppState};
use testrun::telemetry;
use testrun::{
    InProcEventBus, OrchestratorBuilder, RunEventPublisher, RunStore,
    ShutdownToken, SimulatedExecutor, WorkerPool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "testrun=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceArgs::parse()
        .into_config()
        .context("invalid configuration")?;

    tracing::info!(
        workers = ?config.pool.workers,
        max_attempts = config.orchestrator.retry.max_attempts,
        enforce_deadline = config.orchestrator.enforce_deadline,
        "starting testrun server"
    );

    #[cfg(feature = "metrics")]
    testrun::metrics::init_metrics()?;

    let pool = Arc::new(WorkerPool::new(config.pool.workers.clone())?);
    telemetry::set_workers_available(pool.available_count());

    let events = Arc::new(InProcEventBus::default());
    let shutdown = ShutdownToken::new();
    let recorder =
        telemetry::spawn_event_recorder(events.subscribe(), shutdown.clone());

    let orchestrator = OrchestratorBuilder::new(config.orchestrator.clone())
        .with_store(Arc::new(RunStore::new()))
        .with_pool(pool)
        .with_executor(Arc::new(SimulatedExecutor::new(config.simulation.clone())))
        .with_events(events)
        .build()?;

    let listener = tokio::net::TcpListener::bind(config.server.bind_address())
        .await
        .with_context(|| {
            format!("failed to bind {}", config.server.bind_address())
        })?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                signal_token.cancel();
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for shutdown signal")
            }
        }
    });

    server::serve(listener, AppState::new(orchestrator.clone()), shutdown.clone())
        .await?;

    if !orchestrator.shutdown(config.server.shutdown_grace()).await {
        tracing::warn!("exiting with runs still in flight");
    }
    shutdown.cancel();
    let _ = recorder.await;

    Ok(())
}
