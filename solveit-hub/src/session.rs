//! Per-connection loops.
//!
//! A served connection runs three cooperating tasks:
//! - the read loop (this task): parses envelopes, refreshes the read
//!   deadline on pong, hands MESSAGE payloads to the feature queue
//! - the heartbeat: pings every `ping_period`; a ping that finds the
//!   outbound buffer still full removes the connection on the spot
//! - the writer: drains the connection's outbound buffer into the socket
//!
//! Whichever notices a failure first closes the handle, and every path ends
//! in `unregister`.

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use solveit_core::config::RealtimeConfig;

use crate::frame::{EnvelopeKind, Frame, InboundEnvelope};
use crate::hub::{ConnectionHandle, TopicHub};
use crate::queue::InboundQueue;
use crate::topic::Topic;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time allowed between pongs before the peer is considered gone
    pub pong_wait: Duration,
    /// Time allowed for a single write
    pub write_wait: Duration,
    /// Frames buffered per connection
    pub outbound_buffer: usize,
    /// Largest inbound frame accepted at the upgrade layer
    pub max_message_size: usize,
}

impl SessionConfig {
    /// Pings go out a little before the peer's pong deadline
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for SessionConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            pong_wait: config.pong_wait(),
            write_wait: config.write_wait(),
            outbound_buffer: config.outbound_buffer,
            max_message_size: config.max_message_size,
        }
    }
}

/// Why a read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    ReadError,
    ReadDeadline,
    Closed,
    Shutdown,
}

impl Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::PeerClosed => "peer closed",
            Self::ReadError => "read error",
            Self::ReadDeadline => "read deadline exceeded",
            Self::Closed => "connection closed",
            Self::Shutdown => "server shutting down",
        };
        f.write_str(reason)
    }
}

impl TopicHub {
    /// Register a connection under `topic` and run it until it closes.
    ///
    /// `stream` yields frames read from the peer, `sink` writes frames to it.
    /// Returns once the connection has been unregistered.
    pub async fn serve<S, E, K>(
        &self,
        topic: Topic,
        mut stream: S,
        sink: K,
        inbound: InboundQueue,
        shutdown: CancellationToken,
    ) -> CloseReason
    where
        S: Stream<Item = Result<Frame, E>> + Unpin + Send,
        E: Display + Send,
        K: Sink<Frame> + Unpin + Send + 'static,
        K::Error: Display + Send,
    {
        let config = self.config().clone();
        let (handle, outbound) = ConnectionHandle::new(config.outbound_buffer);
        self.register(topic.clone(), handle.clone()).await;

        let writer = tokio::spawn(write_loop(
            sink,
            outbound,
            handle.clone(),
            topic.clone(),
            config.write_wait,
        ));
        let heartbeat = tokio::spawn(self.clone().heartbeat(
            topic.clone(),
            handle.clone(),
            shutdown.clone(),
        ));

        let reason = read_loop(&mut stream, &handle, &inbound, &config, &shutdown, &topic).await;

        self.unregister(&topic, handle.id()).await;
        handle.close();
        for (task, result) in [("heartbeat", heartbeat.await), ("writer", writer.await)] {
            if let Err(e) = result {
                warn!(topic = %topic, connection_id = %handle.id(), task, error = %e, "Connection task failed");
            }
        }

        info!(
            topic = %topic,
            connection_id = %handle.id(),
            feature = inbound.feature(),
            reason = %reason,
            "Connection closed"
        );
        reason
    }

    async fn heartbeat(self, topic: Topic, handle: ConnectionHandle, shutdown: CancellationToken) {
        let period = self.config().ping_period();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        let closed = handle.closed_token();

        loop {
            tokio::select! {
                biased;
                () = closed.cancelled() => break,
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = handle.try_send(Frame::Ping(Bytes::new())) {
                        warn!(
                            topic = %topic,
                            connection_id = %handle.id(),
                            error = %e,
                            "Heartbeat failed, removing connection"
                        );
                        self.unregister(&topic, handle.id()).await;
                        handle.close();
                        break;
                    }
                    trace!(topic = %topic, connection_id = %handle.id(), "Ping queued");
                }
            }
        }
    }
}

async fn read_loop<S, E>(
    stream: &mut S,
    handle: &ConnectionHandle,
    inbound: &InboundQueue,
    config: &SessionConfig,
    shutdown: &CancellationToken,
    topic: &Topic,
) -> CloseReason
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let closed = handle.closed_token();
    let deadline = tokio::time::sleep(config.pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            () = closed.cancelled() => return CloseReason::Closed,
            () = shutdown.cancelled() => return CloseReason::Shutdown,
            () = &mut deadline => return CloseReason::ReadDeadline,
            next = stream.next() => match next {
                None | Some(Ok(Frame::Close)) => return CloseReason::PeerClosed,
                Some(Err(e)) => {
                    debug!(topic = %topic, connection_id = %handle.id(), error = %e, "Read failed");
                    return CloseReason::ReadError;
                }
                Some(Ok(Frame::Pong(_))) => {
                    deadline.as_mut().reset(Instant::now() + config.pong_wait);
                }
                Some(Ok(Frame::Ping(_))) => {}
                Some(Ok(Frame::Text(text))) => dispatch(&text, inbound, topic, handle.id()),
                Some(Ok(Frame::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => dispatch(text, inbound, topic, handle.id()),
                    Err(_) => debug!(topic = %topic, "Ignoring non UTF-8 binary frame"),
                },
            }
        }
    }
}

/// Route one inbound text frame. Bad frames are dropped, never fatal.
fn dispatch(text: &str, inbound: &InboundQueue, topic: &Topic, connection_id: &str) {
    let envelope: InboundEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(topic = %topic, connection_id, error = %e, "Dropping malformed frame");
            return;
        }
    };

    match envelope.kind() {
        EnvelopeKind::Ping => trace!(topic = %topic, connection_id, "Client ping"),
        EnvelopeKind::Message => {
            inbound.offer(envelope.payload, topic);
        }
        EnvelopeKind::Unknown => {
            warn!(topic = %topic, connection_id, kind = %envelope.kind, "Unknown message type");
        }
    }
}

async fn write_loop<K>(
    mut sink: K,
    mut outbound: mpsc::Receiver<Frame>,
    handle: ConnectionHandle,
    topic: Topic,
    write_wait: Duration,
) where
    K: Sink<Frame> + Unpin,
    K::Error: Display,
{
    let closed = handle.closed_token();

    loop {
        tokio::select! {
            biased;
            () = closed.cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let written = tokio::select! {
                    biased;
                    () = closed.cancelled() => break,
                    written = tokio::time::timeout(write_wait, sink.send(frame)) => written,
                };
                match written {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(topic = %topic, connection_id = %handle.id(), error = %e, "Write failed");
                        handle.close();
                        break;
                    }
                    Err(_) => {
                        warn!(topic = %topic, connection_id = %handle.id(), "Write timed out");
                        handle.close();
                        break;
                    }
                }
            }
        }
    }

    match tokio::time::timeout(write_wait, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => trace!(topic = %topic, error = %e, "Closing sink failed"),
        Err(_) => trace!(topic = %topic, "Closing sink timed out"),
    }
}
