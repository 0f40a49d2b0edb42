// Module: http
// Websocket upgrade endpoints and the notification publish endpoint

pub mod error;
pub mod health;
pub mod notifications;
pub mod websocket;

use axum::{http::HeaderValue, routing::post, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use solveit_hub::Relays;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relays: Relays,
    pub allowed_origins: Arc<[String]>,
    /// Cancelled on shutdown; ends every open websocket session
    pub shutdown: CancellationToken,
}

impl AppState {
    #[must_use]
    pub fn new(relays: Relays, allowed_origins: Vec<String>, shutdown: CancellationToken) -> Self {
        Self {
            relays,
            allowed_origins: allowed_origins.into(),
            shutdown,
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .merge(health::create_health_router())
        .merge(websocket::create_websocket_router())
        .route(
            "/api/v1/send-notification",
            post(notifications::send_notification),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins = allowed_origins.iter().filter_map(|origin| {
        HeaderValue::from_str(origin)
            .inspect_err(|_| warn!(origin = %origin, "Ignoring invalid allowed origin"))
            .ok()
    });
    layer.allow_origin(AllowOrigin::list(origins))
}
