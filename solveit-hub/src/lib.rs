//! Realtime fan-out over persistent websocket connections.
//!
//! [`TopicHub`] keeps live connections grouped by [`Topic`]; relays in
//! [`relay`] give each feature its topic naming and inbound queue.

pub mod error;
pub mod frame;
pub mod hub;
pub mod queue;
pub mod relay;
pub mod session;
pub mod topic;

pub use error::{Error, Result};
pub use frame::{EnvelopeKind, Frame, InboundEnvelope};
pub use hub::{ConnectionHandle, ConnectionId, TopicHub};
pub use queue::InboundQueue;
pub use relay::{Feed, Relay, Relays, SubscribeQuery};
pub use session::{CloseReason, SessionConfig};
pub use topic::Topic;
