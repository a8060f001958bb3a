//! Test helpers for `testrun`: scripted executors, fixtures and polling.

pub mod executor;
pub mod wait;

pub use executor::{ExecutionCall, GatedExecutor, MockBehavior, MockExecutor};
pub use wait::{
    wait_for_completed, wait_for_exhausted, wait_for_run, wait_for_terminal,
    wait_until,
};

use std::sync::Arc;
use testrun::{
    Executor, InProcEventBus, OrchestratorConfig, RetryPolicy, RunEvent,
    RunId, RunRequest, RunStore, TestRunOrchestrator, WorkerPool,
};
use tokio::sync::broadcast;

/// A request every validator accepts.
pub fn valid_request() -> RunRequest {
    RunRequest::new("http://x/app.apk", "s.sh", 10)
}

/// Immediate retries, three attempts, deadline enforced.
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryPolicy::immediate(3),
        ..OrchestratorConfig::default()
    }
}

/// Orchestrator over a fresh store and event bus with the given workers.
pub fn orchestrator_with<E>(
    workers: &[&str],
    executor: E,
    config: OrchestratorConfig,
) -> TestRunOrchestrator
where
    E: Executor + 'static,
{
    let pool = WorkerPool::new(workers.iter().copied())
        .unwrap_or_else(|err| panic!("invalid test pool: {err}"));
    TestRunOrchestrator::new(
        config,
        Arc::new(RunStore::new()),
        Arc::new(pool),
        Arc::new(executor),
        Arc::new(InProcEventBus::new(1024)),
    )
}

/// Drain every event already buffered on `receiver`.
pub fn drain_events(receiver: &mut broadcast::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Event kinds for one run, in publish order.
pub fn kinds_for(events: &[RunEvent], id: RunId) -> Vec<&'static str> {
    events
        .iter()
        .filter(|event| event.run_id() == id)
        .map(|event| event.payload.kind())
        .collect()
}
