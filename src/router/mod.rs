//! Command routing from the bus to consumer mailboxes.
//!
//! A [`ConsumerRegistry`] is an explicit map of live consumers, keyed by
//! consumer identifier and by queue name, passed to the
//! [`CommandRouter`] at construction. The router receives every inbound
//! [`CommandEnvelope`], resolves its addressees and forwards it; envelopes
//! addressed to nobody are dropped without side effects or replies.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::consumer::ConsumerHandle;
use crate::messaging::CommandEnvelope;

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a consumer with id {0} is already registered")]
    DuplicateConsumer(Uuid),
}

/// Explicit map of live consumers, keyed by identifier and queue name.
///
/// Concurrent: registration and lookup may happen from any task while the
/// router is dispatching.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    by_id: DashMap<Uuid, ConsumerHandle>,
    by_queue: DashMap<String, Vec<ConsumerHandle>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer handle under its id and queue name
    pub fn register(&self, handle: ConsumerHandle) -> Result<(), RegistryError> {
        let consumer_id = handle.consumer_id();
        if self.by_id.contains_key(&consumer_id) {
            return Err(RegistryError::DuplicateConsumer(consumer_id));
        }

        self.by_queue
            .entry(handle.queue_name().to_string())
            .or_default()
            .push(handle.clone());
        self.by_id.insert(consumer_id, handle);

        info!(consumer_id = %consumer_id, "Registered consumer");
        Ok(())
    }

    /// Remove a consumer from both indexes
    pub fn deregister(&self, consumer_id: Uuid) -> Option<ConsumerHandle> {
        let (_, handle) = self.by_id.remove(&consumer_id)?;
        if let Some(mut handles) = self.by_queue.get_mut(handle.queue_name()) {
            handles.retain(|h| h.consumer_id() != consumer_id);
        }
        info!(consumer_id = %consumer_id, "Deregistered consumer");
        Some(handle)
    }

    /// Look up a consumer by identifier
    pub fn by_id(&self, consumer_id: Uuid) -> Option<ConsumerHandle> {
        self.by_id.get(&consumer_id).map(|entry| entry.value().clone())
    }

    /// All consumers serving the named queue
    pub fn by_queue(&self, queue_name: &str) -> Vec<ConsumerHandle> {
        self.by_queue
            .get(queue_name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Dispatches inbound command envelopes to the consumers they address.
pub struct CommandRouter {
    registry: Arc<ConsumerRegistry>,
}

impl CommandRouter {
    pub fn new(registry: Arc<ConsumerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        &self.registry
    }

    /// Resolve the envelope's addressees and forward it.
    ///
    /// Returns the number of consumers the envelope was delivered to. A
    /// consumer whose mailbox has closed is pruned from the registry.
    pub async fn dispatch(&self, envelope: CommandEnvelope) -> usize {
        let targets = match (envelope.consumer_id, envelope.queue_name.as_deref()) {
            // A set consumer id takes precedence over any queue name
            (Some(consumer_id), _) => self.registry.by_id(consumer_id).into_iter().collect(),
            (None, Some(queue_name)) => self.registry.by_queue(queue_name),
            (None, None) => {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    command = envelope.command.name(),
                    "Envelope with no target discarded"
                );
                Vec::new()
            }
        };

        if targets.is_empty() {
            debug!(
                envelope_id = %envelope.envelope_id,
                command = envelope.command.name(),
                "Envelope addresses no registered consumer"
            );
            return 0;
        }

        let deliveries = futures::future::join_all(
            targets.iter().map(|handle| handle.deliver(envelope.clone())),
        )
        .await;

        let mut delivered = 0;
        for (handle, delivery) in targets.iter().zip(deliveries) {
            match delivery {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        consumer_id = %handle.consumer_id(),
                        error = %e,
                        "Pruning consumer with closed mailbox"
                    );
                    self.registry.deregister(handle.consumer_id());
                }
            }
        }
        delivered
    }

    /// Run the command receiver loop: envelopes from the bus client are
    /// processed one at a time in arrival order.
    pub fn start(self: Arc<Self>, mut commands: mpsc::Receiver<CommandEnvelope>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(envelope) = commands.recv().await {
                self.dispatch(envelope).await;
            }
            debug!("Command channel closed; router receiver exiting");
        })
    }
}
