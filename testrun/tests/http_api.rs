//! HTTP API tests driven through the router with `oneshot`.

use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use testrun::server::{AppState, build_router};
use testrun::{RunId, TestRunOrchestrator};
use testrun_testkit::{
    MockExecutor, orchestrator_with, test_config, wait_for_completed,
};
use tower::ServiceExt;

fn app() -> (Router, TestRunOrchestrator) {
    let orchestrator =
        orchestrator_with(&["worker1"], MockExecutor::passing(), test_config());
    (build_router(AppState::new(orchestrator.clone())), orchestrator)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (router, _) = app();
    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(true));

    let (status, _) = send(&router, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_submit_then_poll_until_completed() {
    let (router, orchestrator) = app();

    let (status, body) = send(
        &router,
        post_json(
            "/test-runs",
            r#"{"apkUrl":"http://x/app.apk","testScript":"s.sh","timeout":10}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let run_id: RunId = body["runId"].as_str().unwrap().parse().unwrap();

    wait_for_completed(&orchestrator, run_id, Duration::from_secs(5)).await;

    let (status, body) =
        send(&router, get(&format!("/test-runs/{run_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runId"], run_id.to_string());
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["apkUrl"], "http://x/app.apk");
    assert_eq!(body["testScript"], "s.sh");
    assert_eq!(body["timeout"], 10);
    assert_eq!(body["worker"], "worker1");
    assert_eq!(body["results"]["passed"], true);
    assert_eq!(body["attemptsUsed"], 1);
    assert!(body.get("error").is_none());
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn test_versioned_prefix_serves_same_runs() {
    let (router, orchestrator) = app();

    let (status, body) = send(
        &router,
        post_json(
            "/api/v1/test-runs",
            r#"{"apkUrl":"a.apk","testScript":"s.sh","timeout":5}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let run_id: RunId = body["runId"].as_str().unwrap().parse().unwrap();
    wait_for_completed(&orchestrator, run_id, Duration::from_secs(5)).await;

    let (status, body) =
        send(&router, get(&format!("/api/v1/test-runs/{run_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");

    let (status, _) = send(&router, get(&format!("/test-runs/{run_id}"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_submit_rejects_invalid_bodies() {
    let (router, orchestrator) = app();

    for body in [
        r#"{"testScript":"s.sh","timeout":10}"#,
        r#"{"apkUrl":"   ","testScript":"s.sh","timeout":10}"#,
        r#"{"apkUrl":"a.apk","testScript":"","timeout":10}"#,
        r#"{"apkUrl":"a.apk","testScript":"s.sh"}"#,
        r#"{"apkUrl":"a.apk","testScript":"s.sh","timeout":-1}"#,
        r#"{"apkUrl":"a.apk","testScript":"s.sh","timeout":"ten"}"#,
        "not json",
    ] {
        let (status, response) = send(&router, post_json("/test-runs", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(response["error"]["status"], 400, "body: {body}");
        assert!(response["error"]["code"].is_string());
        assert!(response["error"]["message"].is_string());
    }

    assert!(orchestrator.store().is_empty());
}

#[tokio::test]
async fn test_missing_field_message_names_field() {
    let (router, _) = app();
    let (_, response) = send(
        &router,
        post_json("/test-runs", r#"{"testScript":"s.sh","timeout":10}"#),
    )
    .await;
    assert_eq!(response["error"]["code"], "invalid_argument");
    assert_eq!(response["error"]["message"], "apkUrl is required");
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_not_found() {
    let (router, _) = app();

    let (status, body) =
        send(&router, get(&format!("/test-runs/{}", RunId::new()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["status"], 404);

    let (status, _) = send(&router, get("/test-runs/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
