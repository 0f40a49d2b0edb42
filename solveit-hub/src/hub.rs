use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::session::SessionConfig;
use crate::topic::Topic;

/// Handle for a client connection
pub type ConnectionId = String;

/// Write side of one live connection.
///
/// Frames go through a bounded buffer drained by the connection's writer
/// task. Cancelling `closed` tears down every loop of the connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (outbound, rx) = mpsc::channel(buffer.max(1));
        let handle = Self {
            id: nanoid::nanoid!(12),
            outbound,
            closed: CancellationToken::new(),
        };
        (handle, rx)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a frame, waiting at most `timeout` for buffer space
    pub async fn send(&self, frame: Frame, timeout: Duration) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::ConnectionClosed(self.id.clone()));
        }
        self.outbound
            .send_timeout(frame, timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => Error::WriteTimeout {
                    connection_id: self.id.clone(),
                    timeout,
                },
                mpsc::error::SendTimeoutError::Closed(_) => {
                    Error::ConnectionClosed(self.id.clone())
                }
            })
    }

    /// Queue a frame only if the buffer has room right now
    pub fn try_send(&self, frame: Frame) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::ConnectionClosed(self.id.clone()));
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::BufferFull(self.id.clone()),
            mpsc::error::TrySendError::Closed(_) => Error::ConnectionClosed(self.id.clone()),
        })
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled once the connection is closing
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

/// Registry of live connections keyed by topic.
///
/// A single lock guards both iteration and mutation, so a broadcast never
/// observes a half-registered connection. A topic is present only while it
/// has at least one connection.
#[derive(Clone)]
pub struct TopicHub {
    topics: Arc<Mutex<HashMap<Topic, Vec<ConnectionHandle>>>>,
    config: SessionConfig,
}

impl TopicHub {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn register(&self, topic: Topic, conn: ConnectionHandle) {
        let mut topics = self.topics.lock().await;
        let connection_id = conn.id.clone();
        let connections = topics.entry(topic.clone()).or_default();
        connections.push(conn);

        info!(
            topic = %topic,
            connection_id = %connection_id,
            subscribers = connections.len(),
            "Client subscribed"
        );
    }

    /// Remove a connection from a topic. Unknown connections are ignored.
    pub async fn unregister(&self, topic: &Topic, connection_id: &str) -> bool {
        let mut topics = self.topics.lock().await;
        let Some(connections) = topics.get_mut(topic) else {
            return false;
        };

        let before = connections.len();
        connections.retain(|c| c.id != connection_id);
        let removed = connections.len() != before;

        if connections.is_empty() {
            topics.remove(topic);
            debug!(topic = %topic, "Topic has no more subscribers, removed");
        }
        if removed {
            info!(topic = %topic, connection_id = %connection_id, "Client unsubscribed");
        }
        removed
    }

    /// Serialize `payload` once and write it to every connection of `topic`.
    ///
    /// Returns the number of connections that accepted the frame. Only a
    /// serialization failure is an error; an unknown topic delivers to nobody.
    pub async fn broadcast<T>(&self, topic: &Topic, payload: &T) -> Result<usize>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(payload)?;
        Ok(self.broadcast_frame(topic, Frame::Text(text)).await)
    }

    /// Broadcast to each topic in turn. Delivery to one topic does not
    /// depend on another.
    pub async fn broadcast_many<T>(&self, topics: &[Topic], payload: &T) -> Result<usize>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(payload)?;
        let mut delivered = 0;
        for topic in topics {
            delivered += self.broadcast_frame(topic, Frame::Text(text.clone())).await;
        }
        Ok(delivered)
    }

    /// Write a frame to every connection of `topic`, dropping the ones that
    /// fail. Failed connections are closed so their loops wind down.
    pub async fn broadcast_frame(&self, topic: &Topic, frame: Frame) -> usize {
        let mut topics = self.topics.lock().await;
        let Some(connections) = topics.get_mut(topic) else {
            debug!(topic = %topic, "No subscribers for topic");
            return 0;
        };

        let write_wait = self.config.write_wait;
        let mut retained = Vec::with_capacity(connections.len());
        for conn in std::mem::take(connections) {
            match conn.send(frame.clone(), write_wait).await {
                Ok(()) => retained.push(conn),
                Err(err) => {
                    warn!(
                        topic = %topic,
                        connection_id = %conn.id,
                        error = %err,
                        "Failed to send to client, dropping connection"
                    );
                    conn.close();
                }
            }
        }

        let sent_count = retained.len();
        if retained.is_empty() {
            topics.remove(topic);
            debug!(topic = %topic, "Topic has no more subscribers, removed");
        } else {
            *connections = retained;
        }

        sent_count
    }

    pub async fn contains(&self, topic: &Topic, connection_id: &str) -> bool {
        self.topics
            .lock()
            .await
            .get(topic)
            .is_some_and(|conns| conns.iter().any(|c| c.id == connection_id))
    }

    pub async fn connection_count(&self, topic: &Topic) -> usize {
        self.topics.lock().await.get(topic).map_or(0, Vec::len)
    }

    pub async fn topic_count(&self) -> usize {
        self.topics.lock().await.len()
    }

    pub async fn total_connections(&self) -> usize {
        self.topics.lock().await.values().map(Vec::len).sum()
    }
}

impl Default for TopicHub {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
