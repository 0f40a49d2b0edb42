use std::fmt::Display;

/// Name of a fan-out group. Each feature owns one prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub const NOTIFICATION_PREFIX: &'static str = "notif";
    pub const COMMENTS_PREFIX: &'static str = "comments";
    pub const CHAT_PREFIX: &'static str = "chat";
    pub const SIGNALING_PREFIX: &'static str = "signaling";

    /// Notifications addressed to one user
    pub fn notification(user_id: impl Display) -> Self {
        Self(format!("{}:{user_id}", Self::NOTIFICATION_PREFIX))
    }

    /// Comment thread of one task
    pub fn comments(task_id: impl Display) -> Self {
        Self(format!("{}:{task_id}", Self::COMMENTS_PREFIX))
    }

    /// One participant's view of a mentorship session
    pub fn chat(session_id: impl Display, recipient_id: impl Display) -> Self {
        Self(format!("{}:{session_id}:{recipient_id}", Self::CHAT_PREFIX))
    }

    /// Call signaling for one session
    pub fn signaling(session_id: impl Display) -> Self {
        Self(format!("{}:{session_id}", Self::SIGNALING_PREFIX))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::notification("u1").as_str(), "notif:u1");
        assert_eq!(Topic::comments("t9").as_str(), "comments:t9");
        assert_eq!(Topic::chat("s1", "u2").as_str(), "chat:s1:u2");
        assert_eq!(Topic::signaling("s1").to_string(), "signaling:s1");
        assert_ne!(Topic::chat("s1", "u2"), Topic::chat("s1", "u3"));
    }
}
