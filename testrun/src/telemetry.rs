//! Tracing and telemetry instrumentation for testrun.
//!
//! This module provides helper functions for creating tracing spans and
//! recording metrics during run lifecycle events. All functions work both with
//! and without the `metrics` feature flag.
//!
//! # Features
//!
//! - Tracing spans for the run lifecycle: submit, dispatch, execute
//! - An event recorder task that turns [`RunEvent`]s into counters
//! - Helper functions that are no-ops for metrics when the feature is off
//!
//! # Example
//!
//! ```ignore
//! use testrun::telemetry::{instrument_dispatch, AttemptTimer};
//!
//! let timer = AttemptTimer::start();
//! instrument_dispatch(run_id, 1, async { /* attempt */ }).await;
//! timer.finish("completed");
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{Instrument, Span, info_span};

use crate::events::{RunEvent, RunEventPayload};
use crate::run::RunId;
use crate::runtime::ShutdownToken;

/// Create a tracing span for run submission.
#[must_use]
pub fn run_submit_span(run_id: RunId) -> Span {
    info_span!("testrun.submit", run_id = %run_id)
}

/// Create a tracing span covering the whole dispatch task of a run.
///
/// Attempts are recorded as events inside this span rather than as
/// separate spans, so a run's retries read as one story in the logs.
#[must_use]
pub fn run_dispatch_span(run_id: RunId, max_attempts: u32) -> Span {
    info_span!(
        "testrun.dispatch",
        run_id = %run_id,
        max_attempts = max_attempts,
    )
}

/// Create a tracing span for a single executor call.
///
/// # Arguments
/// * `worker` - The worker holding the attempt
/// * `attempt` - 1-based attempt number
#[must_use]
pub fn run_execute_span(worker: impl AsRef<str>, attempt: u32) -> Span {
    info_span!(
        "testrun.execute",
        worker = %worker.as_ref(),
        attempt = attempt,
    )
}

/// Instrument a future with a run dispatch span.
pub fn instrument_dispatch<F>(
    run_id: RunId,
    max_attempts: u32,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    future.instrument(run_dispatch_span(run_id, max_attempts))
}

/// Record an accepted submission.
pub fn record_run_submitted() {
    #[cfg(feature = "metrics")]
    crate::metrics::record_run_submitted();
}

/// Record a settled attempt outcome.
///
/// # Arguments
/// * `status` - `completed` or `failed`
pub fn record_run_completed(status: impl AsRef<str>) {
    #[cfg(feature = "metrics")]
    crate::metrics::record_run_completed(status.as_ref());
    #[cfg(not(feature = "metrics"))]
    let _ = status;
}

/// Record a retry being scheduled.
pub fn record_run_retried() {
    #[cfg(feature = "metrics")]
    crate::metrics::record_run_retried();
}

/// Record a run giving up after its last attempt.
pub fn record_retries_exhausted() {
    #[cfg(feature = "metrics")]
    crate::metrics::record_retries_exhausted();
}

/// Update the available-workers gauge.
pub fn set_workers_available(available: usize) {
    tracing::trace!(available, "worker availability updated");

    #[cfg(feature = "metrics")]
    crate::metrics::set_workers_available(available as f64);
}

/// Observe the duration of one executor call.
pub fn observe_attempt_duration(status: impl AsRef<str>, duration: Duration) {
    tracing::debug!(
        status = %status.as_ref(),
        duration_secs = duration.as_secs_f64(),
        "attempt duration observed"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::observe_attempt_duration(
        status.as_ref(),
        duration.as_secs_f64(),
    );
}

/// Handle for timing a single executor call.
#[derive(Debug)]
pub struct AttemptTimer {
    start: Instant,
}

impl AttemptTimer {
    /// Start timing now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since [`AttemptTimer::start`].
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timing and observe the duration under `status`.
    pub fn finish(self, status: impl AsRef<str>) -> Duration {
        let elapsed = self.elapsed();
        observe_attempt_duration(status, elapsed);
        elapsed
    }
}

/// Map one event onto the counters it affects.
pub fn record_event(event: &RunEvent) {
    match &event.payload {
        RunEventPayload::Submitted => record_run_submitted(),
        RunEventPayload::Completed { .. } => record_run_completed("completed"),
        RunEventPayload::Failed { .. } => record_run_completed("failed"),
        RunEventPayload::Retried { .. } => record_run_retried(),
        RunEventPayload::RetriesExhausted { .. } => record_retries_exhausted(),
        _ => {}
    }
}

/// Consume events from `events` and record them until shutdown or until the
/// channel closes.
pub fn spawn_event_recorder(
    mut events: broadcast::Receiver<RunEvent>,
    shutdown: ShutdownToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("event recorder shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => record_event(&event),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("event recorder lagged, skipped {skipped} events");
                    }
                }
            }
        }
    })
}
