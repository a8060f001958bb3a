use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::run::{ResultPayload, RunId, RunRecord, RunRequest, RunStatus, WorkerId};

/// Body of `POST /test-runs`.
///
/// Fields are optional so a missing field is reported like a blank one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRunBody {
    pub apk_url: Option<String>,
    pub test_script: Option<String>,
    pub timeout: Option<i64>,
}

impl SubmitRunBody {
    /// Convert into a [`RunRequest`], checking presence and sign of each field.
    pub fn into_request(self) -> Result<RunRequest, RunError> {
        let timeout = self
            .timeout
            .ok_or_else(|| RunError::validation("timeout", "timeout is required"))?;
        let timeout_seconds = u64::try_from(timeout).map_err(|_| {
            RunError::validation("timeout", "timeout must not be negative")
        })?;

        let request = RunRequest::new(
            self.apk_url.unwrap_or_default(),
            self.test_script.unwrap_or_default(),
            timeout_seconds,
        );
        request.validate()?;
        Ok(request)
    }
}

/// Response of `POST /test-runs`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRunResponse {
    pub run_id: RunId,
}

/// Public view of a run returned by `GET /test-runs/{runId}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub run_id: RunId,
    pub status: RunStatus,
    pub apk_url: String,
    pub test_script: String,
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RunRecord> for RunView {
    fn from(record: RunRecord) -> Self {
        Self {
            run_id: record.id,
            status: record.status,
            apk_url: record.apk_url,
            test_script: record.test_script,
            timeout: record.timeout_seconds,
            worker: record.assigned_worker,
            results: record.result,
            error: record.error,
            attempts_used: record.attempts_used,
            last_attempt_error: record.last_attempt_error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(apk: Option<&str>, script: Option<&str>, timeout: Option<i64>) -> SubmitRunBody {
        SubmitRunBody {
            apk_url: apk.map(String::from),
            test_script: script.map(String::from),
            timeout,
        }
    }

    #[test]
    fn test_into_request_accepts_complete_body() {
        let request = body(Some("http://x/app.apk"), Some("s.sh"), Some(10))
            .into_request()
            .unwrap();
        assert_eq!(request, RunRequest::new("http://x/app.apk", "s.sh", 10));
    }

    #[test]
    fn test_into_request_rejects_missing_or_blank_fields() {
        let err = body(None, Some("s.sh"), Some(10)).into_request().unwrap_err();
        assert!(matches!(err, RunError::Validation { field: "apkUrl", .. }));

        let err = body(Some("a.apk"), Some("  "), Some(10))
            .into_request()
            .unwrap_err();
        assert!(matches!(err, RunError::Validation { field: "testScript", .. }));

        let err = body(Some("a.apk"), Some("s.sh"), None).into_request().unwrap_err();
        assert!(matches!(err, RunError::Validation { field: "timeout", .. }));
    }

    #[test]
    fn test_into_request_rejects_negative_timeout() {
        let err = body(Some("a.apk"), Some("s.sh"), Some(-1))
            .into_request()
            .unwrap_err();
        assert_eq!(
            err,
            RunError::validation("timeout", "timeout must not be negative")
        );
    }

    #[test]
    fn test_run_view_omits_unset_fields() {
        let record = RunRecord::queued(RunRequest::new("a.apk", "s.sh", 10));
        let json = serde_json::to_value(RunView::from(record.clone())).unwrap();

        assert_eq!(json["runId"], record.id.to_string());
        assert_eq!(json["status"], "QUEUED");
        assert_eq!(json["timeout"], 10);
        assert_eq!(json["attemptsUsed"], 0);
        assert!(json.get("worker").is_none());
        assert!(json.get("results").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("lastAttemptError").is_none());
    }
}
