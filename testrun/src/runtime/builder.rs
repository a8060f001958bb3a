use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::events::{InProcEventBus, RunEventPublisher};
use crate::executor::Executor;
use crate::pool::WorkerPool;
use crate::store::RunStore;

use super::orchestrator::{OrchestratorConfig, TestRunOrchestrator};

/// Builder for constructing a `TestRunOrchestrator` with explicit dependencies.
///
/// The worker pool and executor are required. The run store and event
/// publisher fall back to an empty [`RunStore`] and a default
/// [`InProcEventBus`].
///
/// # Example
///
/// ```ignore
/// use testrun::*;
///
/// let orchestrator = OrchestratorBuilder::new(OrchestratorConfig::default())
///     .with_pool(Arc::new(WorkerPool::new(["worker1", "worker2"])?))
///     .with_executor(Arc::new(SimulatedExecutor::default()))
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    store: Option<Arc<RunStore>>,
    pool: Option<Arc<WorkerPool>>,
    executor: Option<Arc<dyn Executor>>,
    events: Option<Arc<dyn RunEventPublisher>>,
}

impl fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("config", &self.config)
            .field("store_set", &self.store.is_some())
            .field("pool_set", &self.pool.is_some())
            .field("executor_set", &self.executor.is_some())
            .field("events_set", &self.events.is_some())
            .finish()
    }
}

impl OrchestratorBuilder {
    /// Create a new builder with the given orchestrator configuration.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            store: None,
            pool: None,
            executor: None,
            events: None,
        }
    }

    /// Set the run store.
    pub fn with_store(mut self, store: Arc<RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the worker pool.
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the executor.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the event publisher.
    pub fn with_events(mut self, events: Arc<dyn RunEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the orchestrator with all configured dependencies.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool or executor is missing, or if the retry
    /// policy allows no attempts.
    pub fn build(self) -> anyhow::Result<TestRunOrchestrator> {
        if self.config.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts.into());
        }
        let pool = self
            .pool
            .ok_or_else(|| anyhow::anyhow!("pool dependency missing"))?;
        let executor = self
            .executor
            .ok_or_else(|| anyhow::anyhow!("executor dependency missing"))?;
        let store = self.store.unwrap_or_default();
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(InProcEventBus::default()));

        Ok(TestRunOrchestrator::new(
            self.config,
            store,
            pool,
            executor,
            events,
        ))
    }
}
