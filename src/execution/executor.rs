//! The pluggable job execution seam.
//!
//! The consumer core knows nothing about the scientific work a job does; it
//! hands each record to a [`JobExecutor`] supplied by the embedding process
//! and maps the outcome back onto the record's final status.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;

use crate::events::{JobStatusEvent, StatusBroadcaster};
use crate::models::JobRecord;

/// Create a linked cancellation pair.
///
/// The consumer core keeps the [`CancelHandle`] and passes the
/// [`CancellationSignal`] to the executor for the job's lifetime.
pub fn cancellation_pair() -> (CancelHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancellationSignal { rx })
}

/// Requests best-effort cancellation of one in-flight job
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal the executor to stop. Executors that do not observe the
    /// signal simply run the job to completion.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cooperative cancellation signal observed by executors
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Check the signal without waiting
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested.
    ///
    /// A dropped handle counts as cancellation: a job whose consumer has
    /// gone away has no reason to keep running.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Per-job context handed to the executor alongside the record.
///
/// Lets the executor report progress through the same broadcaster the
/// consumer uses, so observers see one coherent event stream.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    queue_name: String,
    broadcaster: StatusBroadcaster,
}

impl ExecutionContext {
    pub fn new(queue_name: impl Into<String>, broadcaster: StatusBroadcaster) -> Self {
        Self {
            queue_name: queue_name.into(),
            broadcaster,
        }
    }

    /// Name of the queue the job was pulled from
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Publish a progress snapshot of the in-flight job
    pub fn report_progress(&self, job: &JobRecord) {
        self.broadcaster.broadcast_job(JobStatusEvent {
            queue_name: self.queue_name.clone(),
            job: job.clone(),
            publish_time: Utc::now(),
        });
    }
}

/// Executes one job's work.
///
/// Implementations mutate the record's progress fields as they go and
/// return `Ok(())` on success. Any error marks the record `Failed` (or
/// `Terminated`, when cancellation had been requested) and the consumer
/// moves on to the next pending job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &mut JobRecord,
        ctx: &ExecutionContext,
        cancel: CancellationSignal,
    ) -> anyhow::Result<()>;
}
