use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::run::ResultPayload;

/// Verdict reported by an [`Executor`] for one attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The test passed; the payload becomes the run's `result`.
    Pass(ResultPayload),
    /// The test failed; the reason becomes the run's `error`.
    Fail(String),
}

impl Outcome {
    /// A pass with the conventional `passed`/`logs` payload.
    pub fn passed(logs: impl Into<String>) -> Self {
        let mut payload = ResultPayload::new();
        payload.insert("passed".into(), true.into());
        payload.insert("logs".into(), logs.into().into());
        Self::Pass(payload)
    }

    /// A failure with the given reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }
}

/// Runs one attempt of a test against an APK.
///
/// Implementations own device automation and are expected to honour
/// `timeout_seconds`. Returning `Err` is treated like a failed verdict; the
/// error's display text is recorded on the run.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute the script and report a verdict.
    async fn execute(
        &self,
        apk_url: &str,
        test_script: &str,
        timeout_seconds: u64,
    ) -> anyhow::Result<Outcome>;
}

/// Tuning for [`SimulatedExecutor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Shortest artificial execution delay, in milliseconds.
    pub min_delay_ms: u64,
    /// Longest artificial execution delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Probability in `0.0..=1.0` that an attempt passes.
    pub pass_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1_000,
            max_delay_ms: 10_000,
            pass_rate: 0.5,
        }
    }
}

/// Stand-in executor that sleeps for a random time and flips a coin.
#[derive(Clone, Debug, Default)]
pub struct SimulatedExecutor {
    config: SimulationConfig,
}

impl SimulatedExecutor {
    /// Create a simulator; `config` is assumed validated.
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// The simulation settings in effect.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn delay_for(&self, timeout_seconds: u64) -> Duration {
        let mut max_ms = self.config.max_delay_ms;
        if timeout_seconds > 0 {
            max_ms = max_ms.min(timeout_seconds.saturating_mul(1_000));
        }
        let min_ms = self.config.min_delay_ms.min(max_ms);
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(
        &self,
        apk_url: &str,
        test_script: &str,
        timeout_seconds: u64,
    ) -> anyhow::Result<Outcome> {
        let delay = self.delay_for(timeout_seconds);
        tracing::debug!(
            apk_url,
            test_script,
            delay_ms = delay.as_millis() as u64,
            "simulating test execution"
        );
        tokio::time::sleep(delay).await;

        let pass_rate = self.config.pass_rate.clamp(0.0, 1.0);
        if rand::rng().random_bool(pass_rate) {
            Ok(Outcome::passed("Test passed"))
        } else {
            Ok(Outcome::failed("Test failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(pass_rate: f64) -> SimulatedExecutor {
        SimulatedExecutor::new(SimulationConfig {
            min_delay_ms: 0,
            max_delay_ms: 5,
            pass_rate,
        })
    }

    #[tokio::test]
    async fn test_always_passes_at_full_rate() {
        let executor = instant(1.0);
        for _ in 0..10 {
            let outcome = executor.execute("a.apk", "s.sh", 10).await.unwrap();
            match outcome {
                Outcome::Pass(payload) => {
                    assert_eq!(payload["passed"], true);
                    assert_eq!(payload["logs"], "Test passed");
                }
                Outcome::Fail(reason) => panic!("unexpected failure: {reason}"),
            }
        }
    }

    #[tokio::test]
    async fn test_always_fails_at_zero_rate() {
        let executor = instant(0.0);
        let outcome = executor.execute("a.apk", "s.sh", 10).await.unwrap();
        assert_eq!(outcome, Outcome::failed("Test failed"));
    }

    #[test]
    fn test_delay_is_capped_by_timeout() {
        let executor = SimulatedExecutor::default();
        for _ in 0..50 {
            assert!(executor.delay_for(2) <= Duration::from_secs(2));
            let unbounded = executor.delay_for(0);
            assert!(unbounded >= Duration::from_secs(1));
            assert!(unbounded <= Duration::from_secs(10));
        }
    }
}
