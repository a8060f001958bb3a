use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::error::RunError;
use crate::events::{RunEvent, RunEventPayload, RunEventPublisher};
use crate::executor::{Executor, Outcome};
use crate::pool::WorkerPool;
use crate::retry::RetryPolicy;
use crate::run::{ResultPayload, RunId, RunRecord, RunRequest, WorkerId};
use crate::store::RunStore;
use crate::telemetry::{self, AttemptTimer};

/// Upper bound on a single event publish before dispatch moves on.
const PUBLISH_TIMEOUT: Duration = Duration::from_millis(250);

/// Configuration for the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Attempt budget and backoff between failed attempts.
    pub retry: RetryPolicy,
    /// Cancel executor calls that overrun their run's timeout plus grace.
    pub enforce_deadline: bool,
    /// Slack added to a run's timeout before the deadline fires, in seconds.
    pub deadline_grace_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            enforce_deadline: true,
            deadline_grace_secs: 5,
        }
    }
}

impl OrchestratorConfig {
    /// Orchestrator-side deadline for one executor call, if enforced.
    ///
    /// A run timeout of zero means unbounded, so no deadline applies.
    pub fn deadline_for(&self, timeout_seconds: u64) -> Option<Duration> {
        if !self.enforce_deadline || timeout_seconds == 0 {
            return None;
        }
        Some(Duration::from_secs(
            timeout_seconds.saturating_add(self.deadline_grace_secs),
        ))
    }
}

/// Owns run submission, dispatch and retry.
///
/// Each submission gets its own dispatch task. The task loops over attempts
/// until one passes or the retry budget is spent; it reports progress only
/// by updating the run's record in the [`RunStore`] and by publishing
/// [`RunEvent`]s.
#[derive(Clone)]
pub struct TestRunOrchestrator {
    config: OrchestratorConfig,
    store: Arc<RunStore>,
    pool: Arc<WorkerPool>,
    executor: Arc<dyn Executor>,
    events: Arc<dyn RunEventPublisher>,
    tasks: TaskTracker,
}

impl fmt::Debug for TestRunOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRunOrchestrator")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("runs", &self.store.len())
            .field("in_flight", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl TestRunOrchestrator {
    /// Create an orchestrator over the given components.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<RunStore>,
        pool: Arc<WorkerPool>,
        executor: Arc<dyn Executor>,
        events: Arc<dyn RunEventPublisher>,
    ) -> Self {
        Self {
            config,
            store,
            pool,
            executor,
            events,
            tasks: TaskTracker::new(),
        }
    }

    /// Get the orchestrator configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Get a clone of the run store handle.
    pub fn store(&self) -> Arc<RunStore> {
        Arc::clone(&self.store)
    }

    /// Get a clone of the worker pool handle.
    pub fn pool(&self) -> Arc<WorkerPool> {
        Arc::clone(&self.pool)
    }

    /// Get a clone of the event publisher.
    pub fn events(&self) -> Arc<dyn RunEventPublisher> {
        Arc::clone(&self.events)
    }

    /// Number of dispatch tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Accept a run and schedule its dispatch.
    ///
    /// Returns as soon as the QUEUED record exists; worker availability is
    /// only checked by the dispatch task.
    pub async fn submit(&self, request: RunRequest) -> Result<RunId, RunError> {
        request.validate()?;

        let id = self.store.create(RunRecord::queued(request));
        telemetry::run_submit_span(id)
            .in_scope(|| tracing::info!(run_id = %id, "test run submitted"));
        self.publish(id, RunEventPayload::Submitted).await;

        let this = self.clone();
        let max_attempts = self.config.retry.max_attempts;
        self.tasks.spawn(telemetry::instrument_dispatch(
            id,
            max_attempts,
            async move { this.dispatch(id).await },
        ));

        Ok(id)
    }

    /// Current snapshot of a run.
    pub fn get_status(&self, id: RunId) -> Result<RunRecord, RunError> {
        self.store.get(id)
    }

    /// Stop tracking new dispatches and wait up to `grace` for in-flight
    /// ones. Returns `false` if some were still running at the deadline.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        tracing::info!(
            in_flight = self.tasks.len(),
            "waiting for in-flight dispatches"
        );
        self.tasks.close();

        match tokio::time::timeout(grace, self.tasks.wait()).await {
            Ok(()) => {
                tracing::info!("orchestrator shutdown complete");
                true
            }
            Err(_) => {
                tracing::warn!(
                    in_flight = self.tasks.len(),
                    "dispatches still running after shutdown grace period"
                );
                false
            }
        }
    }

    async fn dispatch(self, id: RunId) {
        let policy = self.config.retry.clone();
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(id, attempt).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(
                        run_id = %id,
                        attempt,
                        error = %err,
                        "dispatch aborted: run record rejected update"
                    );
                    return;
                }
            }

            if !policy.should_retry(attempt) {
                break;
            }

            let delay = policy.delay_after(attempt);
            let attempts_remaining = max_attempts - attempt;
            tracing::info!(
                run_id = %id,
                next_attempt = attempt + 1,
                attempts_remaining,
                delay_ms = delay.as_millis() as u64,
                "retrying test run"
            );
            self.publish(
                id,
                RunEventPayload::Retried {
                    next_attempt: attempt + 1,
                    attempts_remaining,
                    delay_ms: delay.as_millis() as u64,
                },
            )
            .await;

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }

        if let Err(err) = self.store.update(id, |run| run.mark_exhausted()) {
            tracing::error!(
                run_id = %id,
                error = %err,
                "failed to mark run as exhausted"
            );
            return;
        }
        tracing::error!(
            run_id = %id,
            attempts = attempt,
            "test run failed after maximum retries"
        );
        self.publish(id, RunEventPayload::RetriesExhausted { attempts: attempt })
            .await;
    }

    /// One dispatch attempt. `Ok(true)` means the run completed.
    async fn attempt(&self, id: RunId, attempt: u32) -> Result<bool, RunError> {
        let Some(worker) = self.pool.try_acquire() else {
            let reason = RunError::NoWorkerAvailable.to_string();
            self.store.update(id, |run| run.mark_failed(reason.clone()))?;
            tracing::warn!(
                run_id = %id,
                attempt,
                "test run attempt failed: {reason}"
            );
            self.publish(
                id,
                RunEventPayload::Failed {
                    worker: None,
                    attempt,
                    reason,
                },
            )
            .await;
            return Ok(false);
        };
        telemetry::set_workers_available(self.pool.available_count());

        let record = match self.store.update(id, |run| {
            run.mark_running(worker.clone())?;
            Ok(run.clone())
        }) {
            Ok(record) => record,
            Err(err) => {
                self.release_worker(&worker);
                return Err(err);
            }
        };
        tracing::info!(
            run_id = %id,
            worker = %worker,
            attempt,
            "test run dispatched to worker"
        );
        self.publish(
            id,
            RunEventPayload::Dispatched {
                worker: worker.clone(),
                attempt,
            },
        )
        .await;

        let timer = AttemptTimer::start();
        let verdict = self.execute(&record, &worker, attempt).await;

        // The worker goes back before the outcome becomes visible.
        self.release_worker(&worker);

        match verdict {
            Ok(payload) => {
                timer.finish("completed");
                self.store.update(id, |run| run.mark_completed(payload))?;
                tracing::info!(
                    run_id = %id,
                    worker = %worker,
                    attempt,
                    "test run completed"
                );
                self.publish(id, RunEventPayload::Completed { worker, attempt })
                    .await;
                Ok(true)
            }
            Err(reason) => {
                timer.finish("failed");
                self.store
                    .update(id, |run| run.mark_failed(reason.clone()))?;
                tracing::warn!(
                    run_id = %id,
                    worker = %worker,
                    attempt,
                    "test run attempt failed: {reason}"
                );
                self.publish(
                    id,
                    RunEventPayload::Failed {
                        worker: Some(worker),
                        attempt,
                        reason,
                    },
                )
                .await;
                Ok(false)
            }
        }
    }

    /// Run the executor, folding errors, panics and overruns into a failure
    /// reason.
    async fn execute(
        &self,
        record: &RunRecord,
        worker: &WorkerId,
        attempt: u32,
    ) -> Result<ResultPayload, String> {
        let call = AssertUnwindSafe(self.executor.execute(
            &record.apk_url,
            &record.test_script,
            record.timeout_seconds,
        ))
        .catch_unwind();

        let guarded = async move {
            match call.await {
                Ok(Ok(Outcome::Pass(payload))) => Ok(payload),
                Ok(Ok(Outcome::Fail(reason))) => Err(reason),
                Ok(Err(err)) => {
                    Err(RunError::ExecutionFailure(format!("{err:#}")).to_string())
                }
                Err(panic) => Err(format!(
                    "executor panicked: {}",
                    panic_message(panic.as_ref())
                )),
            }
        }
        .instrument(telemetry::run_execute_span(worker.as_str(), attempt));

        match self.config.deadline_for(record.timeout_seconds) {
            Some(deadline) => tokio::time::timeout(deadline, guarded)
                .await
                .unwrap_or_else(|_| {
                    Err(format!(
                        "execution timed out after {}s",
                        deadline.as_secs()
                    ))
                }),
            None => guarded.await,
        }
    }

    fn release_worker(&self, worker: &WorkerId) {
        if let Err(err) = self.pool.release(worker.clone()) {
            tracing::error!(
                worker = %worker,
                error = %err,
                "failed to return worker to pool"
            );
        }
        telemetry::set_workers_available(self.pool.available_count());
    }

    async fn publish(&self, id: RunId, payload: RunEventPayload) {
        let kind = payload.kind();
        let publish = self.events.publish(RunEvent::new(id, payload));
        match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(
                run_id = %id,
                event = kind,
                error = %err,
                "failed to publish run event"
            ),
            Err(_) => tracing::warn!(
                run_id = %id,
                event = kind,
                timeout_ms = PUBLISH_TIMEOUT.as_millis() as u64,
                "run event publish timed out, dropping event"
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
