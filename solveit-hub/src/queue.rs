use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::topic::Topic;

/// Producer side of a feature's bounded inbound queue.
///
/// Read loops offer payloads without ever waiting; a full queue drops the
/// payload.
#[derive(Clone, Debug)]
pub struct InboundQueue {
    feature: &'static str,
    tx: mpsc::Sender<serde_json::Value>,
}

impl InboundQueue {
    #[must_use]
    pub fn channel(
        feature: &'static str,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<serde_json::Value>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { feature, tx }, rx)
    }

    #[must_use]
    pub const fn feature(&self) -> &'static str {
        self.feature
    }

    /// Enqueue without blocking. Returns false when the payload was dropped.
    pub fn offer(&self, payload: serde_json::Value, topic: &Topic) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    feature = self.feature,
                    topic = %topic,
                    "Inbound queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    feature = self.feature,
                    topic = %topic,
                    "Inbound queue closed, dropping message"
                );
                false
            }
        }
    }
}
