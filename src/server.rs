//! Liveness and status endpoints for serve mode

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

use crate::tracker::TrackerState;

/// Shared server state.
struct AppState {
    tracker: Arc<TrackerState>,
    interval: Duration,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    last_data_timestamp: i64,
    interval_seconds: u64,
}

async fn handle_health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok\n")
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.tracker.snapshot();
    Json(StatusResponse {
        status: "running",
        last_data_timestamp: snapshot.latest_timestamp,
        interval_seconds: state.interval.as_secs(),
    })
}

/// Build the axum router.
pub fn build_router(tracker: Arc<TrackerState>, interval: Duration) -> Router {
    let state = Arc::new(AppState { tracker, interval });

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .with_state(state)
}

/// Serve the status endpoints until the process exits
pub async fn run_server(
    addr: SocketAddr,
    tracker: Arc<TrackerState>,
    interval: Duration,
) -> std::io::Result<()> {
    let app = build_router(tracker, interval);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting metrics pusher on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}
