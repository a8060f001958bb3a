use std::time::Duration;
use testrun::{RunError, RunId, RunRecord, RunStatus, TestRunOrchestrator};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Poll `condition` until it holds. Panics after `timeout`.
pub async fn wait_until<F>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll a run until `predicate` holds and return that snapshot.
pub async fn wait_for_run<P>(
    orchestrator: &TestRunOrchestrator,
    id: RunId,
    timeout: Duration,
    predicate: P,
) -> RunRecord
where
    P: Fn(&RunRecord) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let record = orchestrator
            .get_status(id)
            .unwrap_or_else(|err| panic!("run {id} lookup failed: {err}"));
        if predicate(&record) {
            return record;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("run {id} did not reach expected state within {timeout:?}, last seen: {record:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait for a run to reach COMPLETED.
pub async fn wait_for_completed(
    orchestrator: &TestRunOrchestrator,
    id: RunId,
    timeout: Duration,
) -> RunRecord {
    wait_for_run(orchestrator, id, timeout, |run| {
        run.status == RunStatus::Completed
    })
    .await
}

/// Wait for a run to spend its whole attempt budget.
pub async fn wait_for_exhausted(
    orchestrator: &TestRunOrchestrator,
    id: RunId,
    timeout: Duration,
) -> RunRecord {
    let marker = RunError::RetriesExhausted.to_string();
    wait_for_run(orchestrator, id, timeout, move |run| {
        run.status == RunStatus::Failed
            && run.error.as_deref() == Some(marker.as_str())
    })
    .await
}

/// Wait for a run to reach either terminal outcome.
pub async fn wait_for_terminal(
    orchestrator: &TestRunOrchestrator,
    id: RunId,
    timeout: Duration,
) -> RunRecord {
    let marker = RunError::RetriesExhausted.to_string();
    wait_for_run(orchestrator, id, timeout, move |run| match run.status {
        RunStatus::Completed => true,
        RunStatus::Failed => run.error.as_deref() == Some(marker.as_str()),
        _ => false,
    })
    .await
}
