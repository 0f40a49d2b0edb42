//! Health check endpoints

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::http::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/healthz/realtime", get(realtime_stats))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct RealtimeStats {
    pub topics: usize,
    pub connections: usize,
}

/// Live topic and connection counts of the hub
pub async fn realtime_stats(State(state): State<AppState>) -> Json<RealtimeStats> {
    let hub = &state.relays.hub;
    Json(RealtimeStats {
        topics: hub.topic_count().await,
        connections: hub.total_connections().await,
    })
}
