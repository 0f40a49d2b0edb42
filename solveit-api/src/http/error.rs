//! Errors returned by the HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

/// Status plus the message sent back to the caller
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            status: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<solveit_hub::Error> for AppError {
    fn from(err: solveit_hub::Error) -> Self {
        if let solveit_hub::Error::MissingParameter(_) = err {
            return Self::bad_request(err.to_string());
        }
        // Delivery failures are per connection and never reach callers in
        // detail.
        tracing::error!(error = %err, "Realtime delivery failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_parameter_is_bad_request() {
        let err = AppError::from(solveit_hub::Error::MissingParameter("user_id"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Missing user_id");
    }

    #[test]
    fn test_delivery_failure_hides_detail() {
        let err = AppError::from(solveit_hub::Error::WriteTimeout {
            connection_id: "c1".to_string(),
            timeout: Duration::from_secs(10),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
        assert_eq!(err.to_string(), "500 Internal Server Error: Internal server error");
    }
}
