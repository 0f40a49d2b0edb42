use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use super::{Feed, PublicUser, Relay, Relays, SubscribeQuery};
use crate::error::Result;
use crate::topic::Topic;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatFile {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: f64,
    pub file_path: String,
    pub uploaded_at: Option<String>,
    pub uploaded_by_id: String,
    pub chat_id: String,
}

/// One mentorship chat message with its attachments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub sent_by: String,
    pub sent_to: String,
    #[serde(default)]
    pub read_at: Option<String>,
    #[serde(default)]
    pub pending: Option<bool>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
    #[serde(default)]
    pub chat_owner: PublicUser,
    #[serde(default)]
    pub chat_files: Vec<ChatFile>,
    #[serde(default)]
    pub message_type: String,
}

/// Tells a participant that a message was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDeletedEvent {
    pub id: String,
    pub session_id: String,
    pub sent_by: String,
    pub sent_to: String,
    pub message_type: String,
}

impl ChatDeletedEvent {
    pub const MESSAGE_TYPE: &'static str = "chat_deleted";

    #[must_use]
    pub fn new(id: String, session_id: String, sent_by: String, sent_to: String) -> Self {
        Self {
            id,
            session_id,
            sent_by,
            sent_to,
            message_type: Self::MESSAGE_TYPE.to_string(),
        }
    }
}

pub struct MentorChatFeed;

impl Feed for MentorChatFeed {
    const NAME: &'static str = "mentor_chat";

    type Message = ChatMessage;

    /// Each participant listens on their own view of the session
    fn subscription_topic(query: &SubscribeQuery) -> Result<Topic> {
        Ok(Topic::chat(query.session_id()?, query.user_id()?))
    }

    fn route(message: &ChatMessage) -> Vec<Topic> {
        if message.session_id.is_empty() {
            return Vec::new();
        }
        let mut topics = Vec::with_capacity(2);
        for participant in [&message.sent_to, &message.sent_by] {
            if participant.is_empty() {
                continue;
            }
            let topic = Topic::chat(&message.session_id, participant);
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    fn select(relays: &Relays) -> &Arc<Relay<Self>> {
        &relays.chat
    }
}

pub type MentorChatRelay = Relay<MentorChatFeed>;

impl Relay<MentorChatFeed> {
    pub async fn send_to_user(
        &self,
        session_id: impl Display,
        recipient_id: impl Display,
        message: &ChatMessage,
    ) -> Result<usize> {
        self.broadcast(&Topic::chat(session_id, recipient_id), message)
            .await
    }

    pub async fn send_delete_to_user(
        &self,
        session_id: impl Display,
        recipient_id: impl Display,
        event: &ChatDeletedEvent,
    ) -> Result<usize> {
        self.broadcast(&Topic::chat(session_id, recipient_id), event)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sent_by: &str, sent_to: &str) -> ChatMessage {
        serde_json::from_value(serde_json::json!({
            "sessionId": "s1",
            "sentBy": sent_by,
            "sentTo": sent_to,
            "message": "hi",
        }))
        .unwrap()
    }

    #[test]
    fn test_routes_to_both_participants() {
        assert_eq!(
            MentorChatFeed::route(&message("student", "mentor")),
            vec![Topic::chat("s1", "mentor"), Topic::chat("s1", "student")]
        );
    }

    #[test]
    fn test_self_message_routes_once() {
        assert_eq!(
            MentorChatFeed::route(&message("u1", "u1")),
            vec![Topic::chat("s1", "u1")]
        );
    }

    #[test]
    fn test_deleted_event_shape() {
        let event = ChatDeletedEvent::new("c1".into(), "s1".into(), "a".into(), "b".into());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["messageType"], "chat_deleted");
        assert_eq!(json["sessionId"], "s1");
    }
}
