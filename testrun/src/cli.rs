use clap::{ArgAction, Parser};

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::run::WorkerId;

/// Command-line and environment overrides for the service.
///
/// Every flag is optional; unset values keep the defaults from
/// [`AppConfig::default`].
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "testrun-server")]
#[command(about = "Dispatches mobile test runs onto a fixed pool of workers")]
pub struct ServiceArgs {
    /// Server host
    #[arg(long, env = "TESTRUN_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, env = "TESTRUN_PORT")]
    pub port: Option<u16>,

    /// Seconds to wait for in-flight runs on shutdown
    #[arg(long, env = "TESTRUN_SHUTDOWN_GRACE_SECS")]
    pub shutdown_grace_secs: Option<u64>,

    /// Comma-separated worker ids, e.g. worker1,worker2,worker3
    #[arg(long, env = "TESTRUN_WORKERS", value_delimiter = ',')]
    pub workers: Option<Vec<String>>,

    /// Attempts per run, including the first
    #[arg(long, env = "TESTRUN_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry; doubles on each further retry
    #[arg(long, env = "TESTRUN_RETRY_BASE_DELAY_MS")]
    pub retry_base_delay_ms: Option<u64>,

    /// Upper bound on the delay between retries
    #[arg(long, env = "TESTRUN_RETRY_MAX_DELAY_MS")]
    pub retry_max_delay_ms: Option<u64>,

    /// Seconds added to a run's timeout before its executor call is cancelled
    #[arg(long, env = "TESTRUN_DEADLINE_GRACE_SECS")]
    pub deadline_grace_secs: Option<u64>,

    /// Cancel executor calls that overrun their deadline (true/false)
    #[arg(long, env = "TESTRUN_ENFORCE_DEADLINE", action = ArgAction::Set)]
    pub enforce_deadline: Option<bool>,

    /// Shortest simulated execution
    #[arg(long, env = "TESTRUN_SIM_MIN_DELAY_MS")]
    pub sim_min_delay_ms: Option<u64>,

    /// Longest simulated execution
    #[arg(long, env = "TESTRUN_SIM_MAX_DELAY_MS")]
    pub sim_max_delay_ms: Option<u64>,

    /// Probability that a simulated execution passes
    #[arg(long, env = "TESTRUN_SIM_PASS_RATE")]
    pub sim_pass_rate: Option<f64>,
}

impl ServiceArgs {
    /// Apply the overrides on top of the defaults and validate the result.
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(grace) = self.shutdown_grace_secs {
            config.server.shutdown_grace_secs = grace;
        }

        if let Some(workers) = self.workers {
            config.pool.workers = workers
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .map(WorkerId::from)
                .collect();
        }

        let retry = &mut config.orchestrator.retry;
        if let Some(max_attempts) = self.max_attempts {
            retry.max_attempts = max_attempts;
        }
        if let Some(base) = self.retry_base_delay_ms {
            retry.base_delay_ms = base;
        }
        if let Some(max) = self.retry_max_delay_ms {
            retry.max_delay_ms = max;
        }
        if let Some(grace) = self.deadline_grace_secs {
            config.orchestrator.deadline_grace_secs = grace;
        }
        if let Some(enforce) = self.enforce_deadline {
            config.orchestrator.enforce_deadline = enforce;
        }

        let sim = &mut config.simulation;
        if let Some(min) = self.sim_min_delay_ms {
            sim.min_delay_ms = min;
        }
        if let Some(max) = self.sim_max_delay_ms {
            sim.max_delay_ms = max;
        }
        if let Some(rate) = self.sim_pass_rate {
            sim.pass_rate = rate;
        }

        config.validate()?;
        Ok(config)
    }
}
