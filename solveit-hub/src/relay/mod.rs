//! Per-feature relays over the shared [`TopicHub`].
//!
//! A relay owns one feature's bounded inbound queue and knows how that
//! feature names its topics. Its pump decodes queued payloads into the
//! feature's message type and republishes them to the derived topics.

pub mod chat;
pub mod comments;
pub mod notification;
pub mod signaling;

use futures::{Sink, Stream};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::hub::TopicHub;
use crate::queue::InboundQueue;
use crate::session::CloseReason;
use crate::topic::Topic;

pub use chat::{ChatDeletedEvent, ChatFile, ChatMessage, MentorChatFeed, MentorChatRelay};
pub use comments::{Comment, CommentsFeed, CommentsRelay, PublicUser};
pub use notification::{NotificationFeed, NotificationMessage, NotificationRelay};
pub use signaling::{SignalMessage, SignalingFeed, SignalingRelay};

/// Query parameters accepted by the upgrade endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeQuery {
    pub user_id: Option<String>,
    pub task_id: Option<String>,
    pub session_id: Option<String>,
}

impl SubscribeQuery {
    pub fn user_id(&self) -> Result<&str> {
        require(self.user_id.as_deref(), "user_id")
    }

    pub fn task_id(&self) -> Result<&str> {
        require(self.task_id.as_deref(), "task_id")
    }

    pub fn session_id(&self) -> Result<&str> {
        require(self.session_id.as_deref(), "session_id")
    }
}

fn require<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingParameter(name)),
    }
}

/// A realtime feature: its message type and topic naming.
pub trait Feed: Send + Sync + Sized + 'static {
    const NAME: &'static str;

    type Message: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Topic a new connection subscribes to
    fn subscription_topic(query: &SubscribeQuery) -> Result<Topic>;

    /// Topics an inbound message is republished to. Empty drops the message.
    fn route(message: &Self::Message) -> Vec<Topic>;

    /// This feature's relay within a [`Relays`] set
    fn select(relays: &Relays) -> &Arc<Relay<Self>>;
}

pub struct Relay<F: Feed> {
    hub: TopicHub,
    queue: InboundQueue,
    receiver: Mutex<Option<mpsc::Receiver<serde_json::Value>>>,
    _feed: PhantomData<fn() -> F>,
}

impl<F: Feed> Relay<F> {
    #[must_use]
    pub fn new(hub: TopicHub, queue_capacity: usize) -> Self {
        let (queue, receiver) = InboundQueue::channel(F::NAME, queue_capacity);
        Self {
            hub,
            queue,
            receiver: Mutex::new(Some(receiver)),
            _feed: PhantomData,
        }
    }

    #[must_use]
    pub const fn hub(&self) -> &TopicHub {
        &self.hub
    }

    #[must_use]
    pub fn inbound(&self) -> InboundQueue {
        self.queue.clone()
    }

    /// Serve one upgraded connection under `topic` with this feature's queue
    pub async fn subscribe<S, E, K>(
        &self,
        topic: Topic,
        stream: S,
        sink: K,
        shutdown: CancellationToken,
    ) -> CloseReason
    where
        S: Stream<Item = std::result::Result<Frame, E>> + Unpin + Send,
        E: Display + Send,
        K: Sink<Frame> + Unpin + Send + 'static,
        K::Error: Display + Send,
    {
        self.hub
            .serve(topic, stream, sink, self.queue.clone(), shutdown)
            .await
    }

    /// Write any serializable payload to one topic
    pub async fn broadcast<T>(&self, topic: &Topic, payload: &T) -> Result<usize>
    where
        T: Serialize + ?Sized,
    {
        self.hub.broadcast(topic, payload).await
    }

    /// Deliver a message to every topic it routes to
    pub async fn publish(&self, message: &F::Message) -> Result<usize> {
        let topics = F::route(message);
        if topics.is_empty() {
            warn!(feature = F::NAME, "Message has no destination, dropping");
            return Ok(0);
        }
        self.hub.broadcast_many(&topics, message).await
    }

    /// Start draining the inbound queue. Only the first call starts a pump.
    pub fn spawn_pump(self: &Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let receiver = self.receiver.lock().take()?;
        let relay = Arc::clone(self);
        Some(tokio::spawn(relay.pump(receiver, shutdown)))
    }

    async fn pump(
        self: Arc<Self>,
        mut receiver: mpsc::Receiver<serde_json::Value>,
        shutdown: CancellationToken,
    ) {
        info!(feature = F::NAME, "Relay pump started");
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                payload = receiver.recv() => match payload {
                    Some(payload) => self.relay(payload).await,
                    None => break,
                },
            }
        }
        info!(feature = F::NAME, "Relay pump stopped");
    }

    async fn relay(&self, payload: serde_json::Value) {
        let message: F::Message = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(feature = F::NAME, error = %e, "Dropping undecodable message");
                return;
            }
        };

        match self.publish(&message).await {
            Ok(delivered) => debug!(feature = F::NAME, delivered, "Relayed inbound message"),
            Err(e) => warn!(feature = F::NAME, error = %e, "Failed to relay inbound message"),
        }
    }
}

/// Every relay of the service, sharing one hub
#[derive(Clone)]
pub struct Relays {
    pub hub: TopicHub,
    pub notifications: Arc<NotificationRelay>,
    pub comments: Arc<CommentsRelay>,
    pub chat: Arc<MentorChatRelay>,
    pub signaling: Arc<SignalingRelay>,
}

impl Relays {
    #[must_use]
    pub fn new(hub: TopicHub, queue_capacity: usize) -> Self {
        Self {
            notifications: Arc::new(Relay::new(hub.clone(), queue_capacity)),
            comments: Arc::new(Relay::new(hub.clone(), queue_capacity)),
            chat: Arc::new(Relay::new(hub.clone(), queue_capacity)),
            signaling: Arc::new(Relay::new(hub.clone(), queue_capacity)),
            hub,
        }
    }

    /// Start every relay's pump on a shared cancellation token
    pub fn spawn_pumps(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        [
            self.notifications.spawn_pump(shutdown.clone()),
            self.comments.spawn_pump(shutdown.clone()),
            self.chat.spawn_pump(shutdown.clone()),
            self.signaling.spawn_pump(shutdown.clone()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
