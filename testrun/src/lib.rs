//! Testrun - asynchronous mobile test-run orchestration.
//!
//! Callers submit a run (an APK reference, a test script reference and a
//! timeout) and get an id back immediately. A background dispatch task checks
//! a worker out of a fixed, named pool, hands the run to an executor, records
//! the outcome and retries failed attempts up to a configured budget. Callers
//! poll the run's record for progress.
//!
//! # Core Concepts
//!
//! - **Run**: [`RunRecord`] is the single source of truth for a submitted run.
//!   Its [`RunStatus`] only moves along the transitions allowed by
//!   [`RunStatus::can_transition_to`].
//!
//! - **Store**: [`RunStore`] keeps every record in memory and applies each
//!   update atomically per run id.
//!
//! - **Pool**: [`WorkerPool`] hands out each worker id to at most one attempt
//!   at a time and never blocks when none is free.
//!
//! - **Executor**: the [`Executor`] trait is the seam to the system that
//!   actually runs tests. [`SimulatedExecutor`] stands in for it.
//!
//! - **Runtime**: [`TestRunOrchestrator`] ties these together and drives each
//!   run's attempt and retry loop.
//!
//! - **Events**: lifecycle [`RunEvent`]s are broadcast on an
//!   [`InProcEventBus`] for observers.
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use testrun::*;
//!
//! let orchestrator = OrchestratorBuilder::new(OrchestratorConfig::default())
//!     .with_pool(Arc::new(WorkerPool::new(["worker1", "worker2"])?))
//!     .with_executor(Arc::new(SimulatedExecutor::default()))
//!     .build()?;
//!
//! let id = orchestrator
//!     .submit(RunRequest::new("http://x/app.apk", "s.sh", 10))
//!     .await?;
//! let record = orchestrator.get_status(id)?;
//! ```

/// Command-line and environment configuration.
pub mod cli;

/// Configuration structures for the server, pool, retries and simulation.
pub mod config;

/// Error taxonomy for runs, the pool and configuration.
pub mod error;

/// Run lifecycle events and the in-process event bus.
///
/// - [`RunEventPublisher`] - sink trait used by the orchestrator
/// - [`RunEvent`] and [`RunEventPayload`] - event data
/// - [`InProcEventBus`] - broadcast implementation
pub mod events;

/// The executor seam and its simulated implementation.
pub mod executor;

#[cfg(feature = "metrics")]
/// Prometheus metrics.
pub mod metrics;

/// Fixed pool of named workers.
pub mod pool;

/// Retry budget and backoff.
pub mod retry;

/// Core run types: ids, statuses, requests and records.
pub mod run;

/// Runtime orchestration.
///
/// - [`TestRunOrchestrator`] - submission, dispatch and retry
/// - [`OrchestratorConfig`] - retry and deadline configuration
/// - [`OrchestratorBuilder`] - dependency wiring
/// - [`ShutdownToken`] - graceful shutdown signaling
pub mod runtime;

/// HTTP API built on axum.
pub mod server;

/// In-memory run record store.
pub mod store;

/// Tracing spans and metric helpers.
pub mod telemetry;

pub use config::*;
pub use error::*;
pub use events::*;
pub use executor::*;
pub use pool::*;
pub use retry::*;
pub use run::*;
pub use runtime::*;
pub use store::*;
