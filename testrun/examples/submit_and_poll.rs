//! Submit a handful of runs against the simulated executor and poll them.
//!
//! Run with `cargo run --example submit_and_poll`. Set `RUST_LOG=testrun=debug`
//! for the dispatch log.

use std::sync::Arc;
use std::time::Duration;

use testrun::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "testrun=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let simulation = SimulationConfig {
        min_delay_ms: 100,
        max_delay_ms: 400,
        pass_rate: 0.5,
    };

    let orchestrator = OrchestratorBuilder::new(OrchestratorConfig::default())
        .with_pool(Arc::new(WorkerPool::new(["worker1", "worker2"])?))
        .with_executor(Arc::new(SimulatedExecutor::new(simulation)))
        .build()?;

    let mut ids = Vec::new();
    for i in 0..4 {
        let request =
            RunRequest::new(format!("http://builds/app-{i}.apk"), "smoke.sh", 5);
        ids.push(orchestrator.submit(request).await?);
    }

    loop {
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut pending = 0;
        for id in &ids {
            let run = orchestrator.get_status(*id)?;
            println!(
                "{id} {:<9} worker={:<8} attempts={}",
                run.status,
                run.assigned_worker.as_ref().map(WorkerId::as_str).unwrap_or("-"),
                run.attempts_used,
            );
            let exhausted =
                run.error.as_deref() == Some(&*RunError::RetriesExhausted.to_string());
            if run.status != RunStatus::Completed && !exhausted {
                pending += 1;
            }
        }
        println!();

        if pending == 0 {
            break;
        }
    }

    orchestrator.shutdown(Duration::from_secs(5)).await;
    Ok(())
}
