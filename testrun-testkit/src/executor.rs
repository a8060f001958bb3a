use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use testrun::{Executor, Outcome};
use tokio::sync::Semaphore;

/// What a [`MockExecutor`] does for one call.
#[derive(Clone, Debug, PartialEq)]
pub enum MockBehavior {
    Pass,
    Fail(String),
    /// Return `Err` from the executor.
    Error(String),
    Panic(String),
    /// Never return.
    Hang,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionCall {
    pub apk_url: String,
    pub test_script: String,
    pub timeout_seconds: u64,
}

/// Executor with scripted outcomes that records every call.
///
/// Scripted behaviors are consumed in order; once the script is empty every
/// call uses the fallback behavior.
#[derive(Clone, Debug)]
pub struct MockExecutor {
    calls: Arc<Mutex<Vec<ExecutionCall>>>,
    script: Arc<Mutex<VecDeque<MockBehavior>>>,
    fallback: Arc<Mutex<MockBehavior>>,
    delay: Duration,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Pass)
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(behavior)),
            delay: Duration::ZERO,
        }
    }

    pub fn passing() -> Self {
        Self::with_behavior(MockBehavior::Pass)
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(reason.into()))
    }

    /// Run `script` first, then fall back to passing.
    pub fn scripted(script: impl IntoIterator<Item = MockBehavior>) -> Self {
        let executor = Self::new();
        executor.script.lock().extend(script);
        executor
    }

    /// Sleep this long before acting on each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.fallback.lock() = behavior;
    }

    pub fn calls(&self) -> Vec<ExecutionCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn assert_call_count_eq(&self, expected: usize) {
        let actual = self.call_count();
        assert_eq!(
            actual, expected,
            "Expected {} executor calls, got {}",
            expected, actual
        );
    }

    fn next_behavior(&self) -> MockBehavior {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone())
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(
        &self,
        apk_url: &str,
        test_script: &str,
        timeout_seconds: u64,
    ) -> anyhow::Result<Outcome> {
        self.calls.lock().push(ExecutionCall {
            apk_url: apk_url.to_string(),
            test_script: test_script.to_string(),
            timeout_seconds,
        });
        let behavior = self.next_behavior();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match behavior {
            MockBehavior::Pass => Ok(Outcome::passed("Test passed")),
            MockBehavior::Fail(reason) => Ok(Outcome::failed(reason)),
            MockBehavior::Error(message) => Err(anyhow::anyhow!(message)),
            MockBehavior::Panic(message) => panic!("{message}"),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Executor whose calls block until the test lets them through.
///
/// Each [`GatedExecutor::release`] lets one pending or future call pass.
#[derive(Clone, Debug)]
pub struct GatedExecutor {
    gate: Arc<Semaphore>,
    entered: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl GatedExecutor {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            entered: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Let `n` calls finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Calls that have started, including ones still blocked.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have started.
    pub async fn wait_for_entered(&self, n: usize, timeout: Duration) {
        let entered = Arc::clone(&self.entered);
        crate::wait::wait_until(timeout, move || {
            entered.load(Ordering::SeqCst) >= n
        })
        .await;
    }
}

impl Default for GatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for GatedExecutor {
    async fn execute(
        &self,
        _apk_url: &str,
        _test_script: &str,
        _timeout_seconds: u64,
    ) -> anyhow::Result<Outcome> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await?;
        permit.forget();
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::passed("Test passed"))
    }
}
