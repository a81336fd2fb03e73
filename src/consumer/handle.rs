use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::consumer::state::ConsumerState;
use crate::error::{Result, ScanqError};
use crate::messaging::CommandEnvelope;
use crate::models::JobRecord;

/// Messages carried by a consumer's mailbox.
///
/// Everything that touches the queue store or the state machine arrives
/// through here, including the worker's own completion notices, so all
/// mutation is serialized on the consumer task.
#[derive(Debug)]
pub(crate) enum ConsumerMessage {
    /// A command envelope delivered by the router
    Envelope(CommandEnvelope),
    /// A new job for the tail of the pending queue
    Submit(JobRecord),
    /// A status echo replacing a stored copy of the job
    UpdateJob(JobRecord),
    /// Internal: the spawned job task finished
    JobFinished {
        job: JobRecord,
        outcome: anyhow::Result<()>,
    },
    /// Cease the consumer loop once the in-flight job has drained
    Disconnect,
}

/// Cloneable address of a running consumer.
///
/// Used by the [`crate::router::CommandRouter`] to deliver envelopes and by
/// local embedders to submit jobs and observe state.
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    consumer_id: Uuid,
    name: String,
    queue_name: String,
    tx: mpsc::Sender<ConsumerMessage>,
    state_rx: watch::Receiver<ConsumerState>,
}

impl ConsumerHandle {
    pub(crate) fn new(
        consumer_id: Uuid,
        name: String,
        queue_name: String,
        tx: mpsc::Sender<ConsumerMessage>,
        state_rx: watch::Receiver<ConsumerState>,
    ) -> Self {
        Self {
            consumer_id,
            name,
            queue_name,
            tx,
            state_rx,
        }
    }

    pub fn consumer_id(&self) -> Uuid {
        self.consumer_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Current state machine position
    pub fn state(&self) -> ConsumerState {
        *self.state_rx.borrow()
    }

    /// Check if the consumer loop has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Deliver a command envelope to the consumer's mailbox
    pub async fn deliver(&self, envelope: CommandEnvelope) -> Result<()> {
        self.send(ConsumerMessage::Envelope(envelope)).await
    }

    /// Append a job to the tail of the pending queue
    pub async fn submit(&self, job: JobRecord) -> Result<()> {
        self.send(ConsumerMessage::Submit(job)).await
    }

    /// Replace the stored copy of a job with a status echo
    pub async fn update_job(&self, job: JobRecord) -> Result<()> {
        self.send(ConsumerMessage::UpdateJob(job)).await
    }

    /// Ask the consumer loop to cease once the in-flight job has drained.
    ///
    /// A consumer that is not yet stopped is stopped first.
    pub async fn disconnect(&self) -> Result<()> {
        self.send(ConsumerMessage::Disconnect).await
    }

    /// Wait until the consumer reaches the given state
    pub async fn wait_for_state(&self, target: ConsumerState) -> Result<()> {
        let mut state_rx = self.state_rx.clone();
        loop {
            if *state_rx.borrow_and_update() == target {
                return Ok(());
            }
            if state_rx.changed().await.is_err() {
                // the consumer is gone; the last observed state is all there is
                return if *state_rx.borrow() == target {
                    Ok(())
                } else {
                    Err(ScanqError::StateTransitionError(format!(
                        "consumer for queue {} exited before reaching state {target}",
                        self.queue_name
                    )))
                };
            }
        }
    }

    /// Wait until the consumer reaches its terminal state
    pub async fn wait_until_stopped(&self) -> Result<()> {
        self.wait_for_state(ConsumerState::Stopped).await
    }

    async fn send(&self, message: ConsumerMessage) -> Result<()> {
        self.tx.send(message).await.map_err(|_| {
            ScanqError::CommandError(format!(
                "consumer mailbox for queue {} is closed",
                self.queue_name
            ))
        })
    }
}
