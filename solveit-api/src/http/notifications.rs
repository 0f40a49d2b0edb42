//! Notification publish endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::debug;

use solveit_hub::relay::NotificationMessage;

use crate::http::error::{AppError, AppResult};
use crate::http::AppState;

/// POST /api/v1/send-notification - Push a notification to its receiver
pub async fn send_notification(
    State(state): State<AppState>,
    body: Result<Json<NotificationMessage>, JsonRejection>,
) -> AppResult<&'static str> {
    let Json(message) = body.map_err(|_| AppError::bad_request("Invalid request"))?;
    if message.receiver_id.is_empty() {
        return Err(AppError::bad_request("Missing receiverId"));
    }

    let delivered = state
        .relays
        .notifications
        .send_to_user(&message.receiver_id, &message)
        .await?;
    debug!(receiver_id = %message.receiver_id, delivered, "Notification pushed");

    Ok("Notification sent")
}
