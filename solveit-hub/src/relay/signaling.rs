use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use super::{Feed, Relay, Relays, SubscribeQuery};
use crate::error::Result;
use crate::topic::Topic;

/// WebRTC signaling exchanged between the peers of a session. The payload
/// (offer, answer, candidate) is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub session_id: String,
    #[serde(default)]
    pub connection_type: String,
}

pub struct SignalingFeed;

impl Feed for SignalingFeed {
    const NAME: &'static str = "signaling";

    type Message = SignalMessage;

    fn subscription_topic(query: &SubscribeQuery) -> Result<Topic> {
        Ok(Topic::signaling(query.session_id()?))
    }

    fn route(signal: &SignalMessage) -> Vec<Topic> {
        if signal.session_id.is_empty() {
            return Vec::new();
        }
        vec![Topic::signaling(&signal.session_id)]
    }

    fn select(relays: &Relays) -> &Arc<Relay<Self>> {
        &relays.signaling
    }
}

pub type SignalingRelay = Relay<SignalingFeed>;

impl Relay<SignalingFeed> {
    pub async fn send_to_session(
        &self,
        session_id: impl Display,
        signal: &SignalMessage,
    ) -> Result<usize> {
        self.broadcast(&Topic::signaling(session_id), signal).await
    }
}
