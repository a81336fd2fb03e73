//! Command envelope and addressing for remote queue control.
//!
//! A [`CommandEnvelope`] is the single control message of the system: clients
//! publish one on the command channel, the [`crate::router::CommandRouter`]
//! delivers it to the consumers it addresses, and the handling consumer
//! republishes it as a reply with `result`/`error_message` populated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ConsumerInfo, JobRecord};

/// Remote control commands understood by a queue consumer.
///
/// One variant per command code; the consumer core matches exhaustively so
/// adding a command is a compile-time-checked change. Commands that act on a
/// specific record carry its identifier in the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueCommand {
    /// Stop pulling pending jobs after the current one finishes
    Pause,
    /// Resume pulling pending jobs
    Resume,
    /// Terminal: cease the worker loop, cancelling the in-flight job (best effort)
    Stop,
    /// Re-initialize the worker loop bookkeeping in place.
    /// Applies to a running or paused consumer only; a stopped consumer
    /// cannot be restarted.
    Restart,
    /// Empty the pending queue; running and completed are untouched
    Clear,
    /// Empty the completed history
    ClearCompleted,
    /// Swap the record one position toward the head of the pending queue
    MoveForward { job_id: Uuid },
    /// Swap the record one position toward the tail of the pending queue
    MoveBackward { job_id: Uuid },
    /// Delete the record from the pending queue
    Remove { job_id: Uuid },
    /// Delete the record from the completed history
    RemoveCompleted { job_id: Uuid },
    /// Reply with an ordered snapshot of the pending queue
    GetQueue,
    /// Reply with a snapshot of the running job and completed history
    GetRunningAndCompleted,
    /// Reply with the consumer identity/state snapshot
    GetInfo,
}

impl QueueCommand {
    /// Wire name of the command code
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Stop => "STOP",
            Self::Restart => "RESTART",
            Self::Clear => "CLEAR",
            Self::ClearCompleted => "CLEAR_COMPLETED",
            Self::MoveForward { .. } => "MOVE_FORWARD",
            Self::MoveBackward { .. } => "MOVE_BACKWARD",
            Self::Remove { .. } => "REMOVE",
            Self::RemoveCompleted { .. } => "REMOVE_COMPLETED",
            Self::GetQueue => "GET_QUEUE",
            Self::GetRunningAndCompleted => "GET_RUNNING_AND_COMPLETED",
            Self::GetInfo => "GET_INFO",
        }
    }

    /// The job-record identifier carried by record-addressed commands
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::MoveForward { job_id }
            | Self::MoveBackward { job_id }
            | Self::Remove { job_id }
            | Self::RemoveCompleted { job_id } => Some(*job_id),
            _ => None,
        }
    }

    /// Check if the command only reads state
    pub fn is_query(&self) -> bool {
        matches!(self, Self::GetQueue | Self::GetRunningAndCompleted | Self::GetInfo)
    }
}

/// Reply payload, set by the handling consumer before the envelope is
/// republished on the acknowledgement channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReplyPayload {
    /// Ordered snapshot of the pending queue (`GET_QUEUE`)
    PendingJobs(Vec<JobRecord>),
    /// Running job and completed history in start order (`GET_RUNNING_AND_COMPLETED`)
    RunningAndCompleted(Vec<JobRecord>),
    /// Consumer identity/state snapshot (`GET_INFO`)
    ConsumerInfo(ConsumerInfo),
}

/// The addressed control message.
///
/// At least one of `consumer_id` and `queue_name` must be set by the sender;
/// a set `consumer_id` takes precedence over `queue_name`. `error_message`
/// and `result` are written once, by the handling consumer only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Unique identifier of this envelope, echoed on the reply
    pub envelope_id: Uuid,
    /// Target consumer; when set, `queue_name` is ignored
    pub consumer_id: Option<Uuid>,
    /// Target queue; fans out to every consumer serving it
    pub queue_name: Option<String>,
    /// The command itself
    #[serde(flatten)]
    pub command: QueueCommand,
    /// Free-text message from the sender
    pub message: Option<String>,
    /// Populated by the handler when the command failed
    pub error_message: Option<String>,
    /// Populated by the handler for query commands
    pub result: Option<ReplyPayload>,
}

impl CommandEnvelope {
    /// Create an envelope addressed to every consumer of the named queue
    pub fn for_queue(queue_name: impl Into<String>, command: QueueCommand) -> Self {
        Self {
            envelope_id: Uuid::new_v4(),
            consumer_id: None,
            queue_name: Some(queue_name.into()),
            command,
            message: None,
            error_message: None,
            result: None,
        }
    }

    /// Create an envelope addressed to exactly one consumer
    pub fn for_consumer(consumer_id: Uuid, command: QueueCommand) -> Self {
        Self {
            envelope_id: Uuid::new_v4(),
            consumer_id: Some(consumer_id),
            queue_name: None,
            command,
            message: None,
            error_message: None,
            result: None,
        }
    }

    /// Attach a free-text message for the handler's logs
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Addressing contract: the envelope is for the given consumer when its
    /// consumer id matches, or when no consumer id is set and the queue name
    /// matches. Anything else must be ignored without side effects.
    pub fn is_addressed_to(&self, consumer_id: Uuid, queue_name: &str) -> bool {
        match self.consumer_id {
            Some(id) => id == consumer_id,
            None => self.queue_name.as_deref() == Some(queue_name),
        }
    }

    /// Turn the envelope into a successful reply carrying `result`
    pub fn into_reply(mut self, result: Option<ReplyPayload>) -> Self {
        self.result = result;
        self.error_message = None;
        self
    }

    /// Turn the envelope into an error reply
    pub fn into_error_reply(mut self, error_message: impl Into<String>) -> Self {
        self.result = None;
        self.error_message = Some(error_message.into());
        self
    }

    /// Check if the handler reported a failure
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}
