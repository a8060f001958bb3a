//! Prometheus metrics instrumentation for testrun.
//!
//! All metrics are conditionally compiled behind the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `testrun_runs_submitted_total` - Runs accepted by the API
//! - `testrun_runs_completed_total` - Attempt outcomes, labelled by status
//! - `testrun_runs_retried_total` - Retries scheduled after a failed attempt
//! - `testrun_retries_exhausted_total` - Runs that spent their attempt budget
//!
//! ## Gauges
//! - `testrun_workers_available` - Workers currently free to take an attempt
//!
//! ## Histograms
//! - `testrun_attempt_duration_seconds` - Executor call duration
#![cfg(feature = "metrics")]

use prometheus::{
    Counter, CounterVec, Gauge, HistogramVec, Opts, Registry,
    exponential_buckets,
};
use std::sync::LazyLock;

/// Global Prometheus registry for testrun metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for accepted submissions.
pub static RUNS_SUBMITTED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    Counter::new("testrun_runs_submitted_total", "Total number of runs submitted")
        .expect("testrun_runs_submitted_total metric creation failed")
});

/// Counter for settled attempts.
///
/// Labels:
/// - `status`: `completed` or `failed`
pub static RUNS_COMPLETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "testrun_runs_completed_total",
        "Total number of run attempts that reached an outcome",
    );
    CounterVec::new(opts, &["status"])
        .expect("testrun_runs_completed_total metric creation failed")
});

/// Counter for scheduled retries.
pub static RUNS_RETRIED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    Counter::new("testrun_runs_retried_total", "Total number of retries scheduled")
        .expect("testrun_runs_retried_total metric creation failed")
});

/// Counter for runs that exhausted their attempts.
pub static RETRIES_EXHAUSTED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    Counter::new(
        "testrun_retries_exhausted_total",
        "Total number of runs that exhausted their retries",
    )
    .expect("testrun_retries_exhausted_total metric creation failed")
});

/// Gauge for free workers.
pub static WORKERS_AVAILABLE: LazyLock<Gauge> = LazyLock::new(|| {
    Gauge::new("testrun_workers_available", "Workers currently available")
        .expect("testrun_workers_available metric creation failed")
});

/// Histogram for executor call duration in seconds.
///
/// Labels:
/// - `status`: `completed` or `failed`
pub static ATTEMPT_DURATION_SECONDS: LazyLock<HistogramVec> =
    LazyLock::new(|| {
        let buckets =
            exponential_buckets(0.01, 2.0, 15).expect("bucket creation failed");
        let opts = prometheus::HistogramOpts::new(
            "testrun_attempt_duration_seconds",
            "Executor call duration in seconds",
        )
        .buckets(buckets);
        HistogramVec::new(opts, &["status"])
            .expect("testrun_attempt_duration_seconds metric creation failed")
    });

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(RUNS_SUBMITTED_TOTAL.clone())
            as Box<dyn prometheus::core::Collector>,
        Box::new(RUNS_COMPLETED_TOTAL.clone()),
        Box::new(RUNS_RETRIED_TOTAL.clone()),
        Box::new(RETRIES_EXHAUSTED_TOTAL.clone()),
        Box::new(WORKERS_AVAILABLE.clone()),
        Box::new(ATTEMPT_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn record_run_submitted() {
    RUNS_SUBMITTED_TOTAL.inc();
}

pub fn record_run_completed(status: &str) {
    RUNS_COMPLETED_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_run_retried() {
    RUNS_RETRIED_TOTAL.inc();
}

pub fn record_retries_exhausted() {
    RETRIES_EXHAUSTED_TOTAL.inc();
}

pub fn set_workers_available(available: f64) {
    WORKERS_AVAILABLE.set(available);
}

pub fn observe_attempt_duration(status: &str, duration_secs: f64) {
    ATTEMPT_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
