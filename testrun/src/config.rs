use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PoolError};
use crate::executor::SimulationConfig;
use crate::run::WorkerId;
use crate::runtime::OrchestratorConfig;

/// Configuration for the HTTP listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Seconds to wait for in-flight dispatches after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_grace_secs: 30,
        }
    }
}

impl ServerConfig {
    /// `host:port` as passed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Configuration for the worker pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker ids, in checkout order.
    pub workers: Vec<WorkerId>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: ["worker1", "worker2", "worker3"]
                .into_iter()
                .map(WorkerId::from)
                .collect(),
        }
    }
}

/// Complete service configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Worker pool membership.
    pub pool: PoolConfig,
    /// Retry and deadline behavior.
    pub orchestrator: OrchestratorConfig,
    /// Simulated executor timing and pass rate.
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Check the configuration for values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.workers.is_empty() {
            return Err(PoolError::Empty.into());
        }
        let mut seen = HashSet::with_capacity(self.pool.workers.len());
        for worker in &self.pool.workers {
            if !seen.insert(worker) {
                return Err(PoolError::Duplicate(worker.clone()).into());
            }
        }

        if self.orchestrator.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        let sim = &self.simulation;
        if sim.min_delay_ms > sim.max_delay_ms {
            return Err(ConfigError::InvertedDelayRange {
                min_ms: sim.min_delay_ms,
                max_ms: sim.max_delay_ms,
            });
        }
        if !(0.0..=1.0).contains(&sim.pass_rate) {
            return Err(ConfigError::PassRateOutOfRange(sim.pass_rate));
        }

        Ok(())
    }
}
