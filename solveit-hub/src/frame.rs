//! Wire types shared by every realtime feature

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Transport-neutral websocket frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close,
}

/// What a client sends: `{"type": "PING" | "MESSAGE", "payload": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Application-level keepalive, consumed by the read loop
    Ping,
    /// Feature payload, handed to the feature's inbound queue
    Message,
    Unknown,
}

impl InboundEnvelope {
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind {
        match self.kind.as_str() {
            "PING" => EnvelopeKind::Ping,
            "MESSAGE" => EnvelopeKind::Message,
            _ => EnvelopeKind::Unknown,
        }
    }
}
