//! Status broadcasting to local listeners and remote observers.
//!
//! Every consumer state transition and job status change is delivered
//! synchronously to locally registered listeners and published on a tokio
//! broadcast channel for the bus client to forward to remote observers.
//! A failing listener is logged and skipped; it never blocks bus
//! publication or the consumer loop.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::consumer::ConsumerState;
use crate::models::JobRecord;

/// Consumer identity/health event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerStatusEvent {
    pub consumer_id: Uuid,
    pub consumer_name: String,
    pub queue_name: String,
    pub state: ConsumerState,
    pub host_name: Option<String>,
    pub publish_time: DateTime<Utc>,
}

/// Job progress/status event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusEvent {
    pub queue_name: String,
    pub job: JobRecord,
    pub publish_time: DateTime<Utc>,
}

/// Event published on the status channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StatusEvent {
    Consumer(ConsumerStatusEvent),
    Job(JobStatusEvent),
}

/// Local observer of consumer and job status changes.
///
/// Listeners are called synchronously on the consumer task; implementations
/// should return quickly. Errors are logged and swallowed.
pub trait QueueStatusListener: Send + Sync {
    fn consumer_status_changed(
        &self,
        event: &ConsumerStatusEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn job_status_changed(
        &self,
        event: &JobStatusEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Fan-out point for status events.
///
/// Cloneable; all clones share the same listener set and broadcast channel.
#[derive(Clone)]
pub struct StatusBroadcaster {
    listeners: Arc<RwLock<Vec<Arc<dyn QueueStatusListener>>>>,
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusBroadcaster {
    /// Create a new broadcaster with the given bus channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            sender,
        }
    }

    /// Register a local listener.
    ///
    /// Safe to call while a delivery is in progress on another task.
    pub fn add_listener(&self, listener: Arc<dyn QueueStatusListener>) {
        self.listeners.write().push(listener);
    }

    /// Deregister a local listener by identity
    pub fn remove_listener(&self, listener: &Arc<dyn QueueStatusListener>) {
        self.listeners
            .write()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Subscribe to the remote-observer event stream
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    /// Number of remote-observer subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of registered local listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Broadcast a consumer state event to listeners and the bus
    pub fn broadcast_consumer(&self, event: ConsumerStatusEvent) {
        for listener in self.snapshot_listeners() {
            if let Err(e) = listener.consumer_status_changed(&event) {
                warn!(
                    consumer_id = %event.consumer_id,
                    state = %event.state,
                    error = %e,
                    "Status listener failed on consumer event"
                );
            }
        }
        self.publish(StatusEvent::Consumer(event));
    }

    /// Broadcast a job status event to listeners and the bus
    pub fn broadcast_job(&self, event: JobStatusEvent) {
        for listener in self.snapshot_listeners() {
            if let Err(e) = listener.job_status_changed(&event) {
                warn!(
                    job_id = %event.job.job_id,
                    status = %event.job.status,
                    error = %e,
                    "Status listener failed on job event"
                );
            }
        }
        self.publish(StatusEvent::Job(event));
    }

    fn publish(&self, event: StatusEvent) {
        // send() errors only when there are no subscribers, which is fine
        let _ = self.sender.send(event);
    }

    // Deliver against a copy of the listener list so listeners can
    // register/deregister from inside a callback without deadlocking.
    fn snapshot_listeners(&self) -> Vec<Arc<dyn QueueStatusListener>> {
        self.listeners.read().clone()
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new(crate::constants::system::DEFAULT_STATUS_CHANNEL_CAPACITY)
    }
}

impl fmt::Debug for StatusBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBroadcaster")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
