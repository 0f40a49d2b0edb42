//! Notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery method recorded with a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationMethod {
    System,
    Email,
}

impl NotificationMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Email => "EMAIL",
        }
    }
}

impl std::fmt::Display for NotificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(Self::System),
            "EMAIL" => Ok(Self::Email),
            _ => Err(anyhow::anyhow!("Invalid notification method: {s}")),
        }
    }
}

/// Persisted notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub subject: Option<String>,
    pub content: String,
    pub method: NotificationMethod,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Create notification request
#[derive(Debug, Clone)]
pub struct CreateNotificationRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub subject: Option<String>,
    pub content: String,
    pub method: NotificationMethod,
}

impl CreateNotificationRequest {
    /// Materialize the request as an unread notification
    #[must_use]
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            subject: self.subject,
            content: self.content,
            method: self.method,
            read: false,
            created_at,
        }
    }
}
