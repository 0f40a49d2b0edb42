use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use solveit_core::models::Notification;

use super::{Feed, Relay, Relays, SubscribeQuery};
use crate::error::Result;
use crate::topic::Topic;

/// Notification as pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    #[serde(default)]
    pub id: String,
    pub content: String,
    pub receiver_id: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: String,
}

impl From<&Notification> for NotificationMessage {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            content: n.content.clone(),
            receiver_id: n.receiver_id.clone(),
            sender_id: n.sender_id.clone(),
            subject: n.subject.clone().unwrap_or_default(),
            method: n.method.to_string(),
            read: n.read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

pub struct NotificationFeed;

impl Feed for NotificationFeed {
    const NAME: &'static str = "notifications";

    type Message = NotificationMessage;

    fn subscription_topic(query: &SubscribeQuery) -> Result<Topic> {
        Ok(Topic::notification(query.user_id()?))
    }

    fn route(message: &NotificationMessage) -> Vec<Topic> {
        if message.receiver_id.is_empty() {
            return Vec::new();
        }
        vec![Topic::notification(&message.receiver_id)]
    }

    fn select(relays: &Relays) -> &Arc<Relay<Self>> {
        &relays.notifications
    }
}

pub type NotificationRelay = Relay<NotificationFeed>;

impl Relay<NotificationFeed> {
    /// Push a notification to every open connection of one user
    pub async fn send_to_user(
        &self,
        user_id: impl Display,
        message: &NotificationMessage,
    ) -> Result<usize> {
        self.broadcast(&Topic::notification(user_id), message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solveit_core::models::{CreateNotificationRequest, NotificationMethod};

    #[test]
    fn test_message_from_notification() {
        let notification = CreateNotificationRequest {
            sender_id: "solveit@org.com".to_string(),
            receiver_id: "u1".to_string(),
            subject: Some("Blocked From A Task".to_string()),
            content: "body".to_string(),
            method: NotificationMethod::System,
        }
        .into_notification(chrono::Utc::now());

        let message = NotificationMessage::from(&notification);
        assert_eq!(message.subject, "Blocked From A Task");
        assert_eq!(message.method, "SYSTEM");
        assert!(!message.read);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["receiverId"], "u1");
        assert_eq!(json["senderId"], "solveit@org.com");
    }

    #[test]
    fn test_routes_to_receiver() {
        let message: NotificationMessage =
            serde_json::from_str(r#"{"content":"c","receiverId":"u7"}"#).unwrap();
        assert_eq!(NotificationFeed::route(&message), vec![Topic::notification("u7")]);

        let orphan = NotificationMessage {
            receiver_id: String::new(),
            ..message
        };
        assert!(NotificationFeed::route(&orphan).is_empty());
    }
}
