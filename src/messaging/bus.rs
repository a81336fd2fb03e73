//! Bus seam for command replies.
//!
//! The transport itself (broker connections, wire format, delivery) is an
//! external collaborator. This module defines the publishing trait the
//! consumer core needs and an in-process implementation used by tests and
//! single-process deployments.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::messaging::envelope::CommandEnvelope;

/// Error types for bus publication
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Reply channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Publisher for command acknowledgements.
///
/// The consumer core republishes every handled envelope through this trait
/// with `result`/`error_message` populated; the embedding process maps it
/// onto the real acknowledgement topic.
#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    async fn publish_reply(&self, reply: CommandEnvelope) -> Result<(), PublishError>;
}

/// In-process reply channel backed by a tokio broadcast channel.
///
/// Senders subscribe independently and correlate replies by `envelope_id`;
/// publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct InProcessBus {
    reply_tx: broadcast::Sender<CommandEnvelope>,
}

impl InProcessBus {
    pub fn new(capacity: usize) -> Self {
        let (reply_tx, _) = broadcast::channel(capacity);
        Self { reply_tx }
    }

    /// Subscribe to the reply stream
    pub fn subscribe_replies(&self) -> broadcast::Receiver<CommandEnvelope> {
        self.reply_tx.subscribe()
    }

    /// Number of active reply subscribers
    pub fn reply_subscriber_count(&self) -> usize {
        self.reply_tx.receiver_count()
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new(crate::constants::system::DEFAULT_STATUS_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl ReplyPublisher for InProcessBus {
    async fn publish_reply(&self, reply: CommandEnvelope) -> Result<(), PublishError> {
        match self.reply_tx.send(reply) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(reply)) => {
                // No subscribers; acceptable for fire-and-forget acknowledgements
                debug!(
                    envelope_id = %reply.envelope_id,
                    command = reply.command.name(),
                    "No reply subscribers for acknowledgement"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::envelope::QueueCommand;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_reply_round_trip() {
        let bus = InProcessBus::new(16);
        let mut replies = bus.subscribe_replies();

        let envelope = CommandEnvelope::for_queue("q", QueueCommand::GetInfo);
        let envelope_id = envelope.envelope_id;
        bus.publish_reply(envelope).await.unwrap();

        let received = replies.recv().await.unwrap();
        assert_eq!(received.envelope_id, envelope_id);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = InProcessBus::new(16);
        let envelope = CommandEnvelope::for_queue("q", QueueCommand::Pause);
        assert_ok!(bus.publish_reply(envelope).await);
    }
}
