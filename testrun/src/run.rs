use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RunError;

/// Opaque key-value payload attached to a completed run.
pub type ResultPayload = serde_json::Map<String, serde_json::Value>;

/// Unique identifier of a submitted test run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl RunId {
    /// Generate a fresh, time-ordered run id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a run.
///
/// QUEUED → RUNNING → {COMPLETED | FAILED}, with FAILED → RUNNING on retry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Accepted, waiting for its first dispatch attempt.
    Queued,
    /// An attempt holds a worker and the executor is running.
    Running,
    /// The executor reported a pass.
    Completed,
    /// The latest attempt failed; terminal once the attempt budget is spent.
    Failed,
}

impl RunStatus {
    /// Whether moving from `self` to `target` is a legal transition.
    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        matches!(
            (self, target),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Queued, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Failed, RunStatus::Running)
                | (RunStatus::Failed, RunStatus::Failed)
        )
    }

    /// Stable lowercase label, used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier of a named execution worker.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Wrap a worker name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The worker name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WorkerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A request to run a test script against an APK.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Location of the APK under test.
    pub apk_url: String,
    /// Reference to the test script to execute.
    pub test_script: String,
    /// Upper bound on execution time, in seconds.
    pub timeout_seconds: u64,
}

impl RunRequest {
    /// Build a request from its parts.
    pub fn new(
        apk_url: impl Into<String>,
        test_script: impl Into<String>,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            apk_url: apk_url.into(),
            test_script: test_script.into(),
            timeout_seconds,
        }
    }

    /// Reject blank APK or script references.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.apk_url.trim().is_empty() {
            return Err(RunError::validation("apkUrl", "apkUrl is required"));
        }
        if self.test_script.trim().is_empty() {
            return Err(RunError::validation(
                "testScript",
                "testScript is required",
            ));
        }
        Ok(())
    }
}

/// State of a single submitted run, as stored and as returned to pollers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Identifier returned at submission.
    pub id: RunId,
    /// Current lifecycle state.
    pub status: RunStatus,
    /// Location of the application package under test.
    pub apk_url: String,
    /// Script the executor runs against the package.
    pub test_script: String,
    /// Per-attempt execution bound in seconds; 0 means unbounded.
    pub timeout_seconds: u64,
    /// Worker holding, or last holding, the run.
    pub assigned_worker: Option<WorkerId>,
    /// Executor payload, set only once COMPLETED.
    pub result: Option<ResultPayload>,
    /// Failure reason, set only while FAILED.
    pub error: Option<String>,
    /// Attempts that reached an executor.
    pub attempts_used: u32,
    /// Reason the most recent attempt failed, kept across retries.
    pub last_attempt_error: Option<String>,
    /// When the run was accepted.
    pub created_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// A fresh QUEUED record for an accepted request.
    pub fn queued(request: RunRequest) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            status: RunStatus::Queued,
            apk_url: request.apk_url,
            test_script: request.test_script,
            timeout_seconds: request.timeout_seconds,
            assigned_worker: None,
            result: None,
            error: None,
            attempts_used: 0,
            last_attempt_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: RunStatus) -> Result<(), RunError> {
        if !self.status.can_transition_to(to) {
            return Err(RunError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Start an attempt on `worker`.
    pub fn mark_running(&mut self, worker: WorkerId) -> Result<(), RunError> {
        self.transition(RunStatus::Running)?;
        self.assigned_worker = Some(worker);
        self.attempts_used += 1;
        self.error = None;
        self.result = None;
        Ok(())
    }

    /// Record a passing attempt.
    pub fn mark_completed(
        &mut self,
        payload: ResultPayload,
    ) -> Result<(), RunError> {
        self.transition(RunStatus::Completed)?;
        self.result = Some(payload);
        self.error = None;
        Ok(())
    }

    /// Record a failed attempt (or the final exhaustion marker).
    pub fn mark_failed(
        &mut self,
        reason: impl Into<String>,
    ) -> Result<(), RunError> {
        self.transition(RunStatus::Failed)?;
        self.result = None;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Replace the last attempt's error with the exhaustion marker, keeping
    /// the attempt's reason in `last_attempt_error`.
    pub fn mark_exhausted(&mut self) -> Result<(), RunError> {
        let last = self.error.take();
        self.mark_failed(RunError::RetriesExhausted.to_string())?;
        self.last_attempt_error = last;
        Ok(())
    }
}
