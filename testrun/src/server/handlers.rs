use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use crate::run::RunId;

use super::AppState;
use super::dto::{RunView, SubmitRunBody, SubmitRunResponse};
use super::error::{ApiError, ApiResult};

/// Liveness probe.
pub async fn health() -> Json<bool> {
    Json(true)
}

/// Accept a run and return its id without waiting for execution.
pub async fn submit_run(
    State(state): State<AppState>,
    body: Result<Json<SubmitRunBody>, JsonRejection>,
) -> ApiResult<Json<SubmitRunResponse>> {
    let Json(body) = body?;
    let request = body.into_request()?;
    let run_id = state.orchestrator.submit(request).await?;
    Ok(Json(SubmitRunResponse { run_id }))
}

/// Current snapshot of a run. Malformed ids are reported as unknown.
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunView>> {
    let id: RunId = run_id
        .parse()
        .map_err(|_| ApiError::not_found(format!("test run {run_id} not found")))?;
    let record = state.orchestrator.get_status(id)?;
    Ok(Json(record.into()))
}

#[cfg(feature = "metrics")]
pub async fn metrics() -> ApiResult<(
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
)> {
    let body = crate::metrics::gather_metrics()?;
    Ok((
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    ))
}
