//! HTTP surface of the service.
//!
//! Routes are served both at the root and under `/api/v1`:
//!
//! - `GET /health`
//! - `POST /test-runs`
//! - `GET /test-runs/{run_id}`
//! - `GET /metrics` (with the `metrics` feature)

pub mod dto;
pub mod error;
pub mod handlers;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::runtime::{ShutdownToken, TestRunOrchestrator};

pub use error::{ApiError, ApiResult};

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: TestRunOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: TestRunOrchestrator) -> Self {
        Self { orchestrator }
    }
}

fn api_routes() -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/test-runs", post(handlers::submit_run))
        .route("/test-runs/{run_id}", get(handlers::get_run));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(handlers::metrics));

    router
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let routes = api_routes();
    Router::new()
        .merge(routes.clone())
        .nest("/api/v1", routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: ShutdownToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "testrun server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("http server stopped");
    Ok(())
}
