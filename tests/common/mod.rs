//! Shared helpers for integration tests: canned executors and reply waiters.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Notify};
use uuid::Uuid;

use scanq_core::execution::{CancellationSignal, ExecutionContext, JobExecutor};
use scanq_core::messaging::CommandEnvelope;
use scanq_core::models::JobRecord;

pub const WAIT: Duration = Duration::from_secs(5);

/// Completes every job immediately, recording execution order.
pub struct RecordingExecutor {
    executed: Mutex<Vec<Uuid>>,
    notify_tx: mpsc::UnboundedSender<Uuid>,
}

impl RecordingExecutor {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Uuid>) {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                executed: Mutex::new(Vec::new()),
                notify_tx,
            }),
            notify_rx,
        )
    }

    pub fn executed(&self) -> Vec<Uuid> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobExecutor for RecordingExecutor {
    async fn execute(
        &self,
        job: &mut JobRecord,
        _ctx: &ExecutionContext,
        _cancel: CancellationSignal,
    ) -> anyhow::Result<()> {
        self.executed.lock().unwrap().push(job.job_id);
        let _ = self.notify_tx.send(job.job_id);
        Ok(())
    }
}

/// Parks each job until released, honoring cancellation.
pub struct GatedExecutor {
    started_tx: mpsc::UnboundedSender<Uuid>,
    release: Notify,
}

impl GatedExecutor {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Uuid>) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                started_tx,
                release: Notify::new(),
            }),
            started_rx,
        )
    }

    /// Let the currently parked job finish
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl JobExecutor for GatedExecutor {
    async fn execute(
        &self,
        job: &mut JobRecord,
        _ctx: &ExecutionContext,
        mut cancel: CancellationSignal,
    ) -> anyhow::Result<()> {
        let _ = self.started_tx.send(job.job_id);
        tokio::select! {
            _ = self.release.notified() => Ok(()),
            _ = cancel.cancelled() => Err(anyhow::anyhow!("execution interrupted")),
        }
    }
}

/// Fails every job.
pub struct FailingExecutor;

#[async_trait]
impl JobExecutor for FailingExecutor {
    async fn execute(
        &self,
        _job: &mut JobRecord,
        _ctx: &ExecutionContext,
        _cancel: CancellationSignal,
    ) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("detector offline"))
    }
}

/// Wait for the reply correlated to the given envelope id.
pub async fn await_reply(
    replies: &mut broadcast::Receiver<CommandEnvelope>,
    envelope_id: Uuid,
) -> CommandEnvelope {
    tokio::time::timeout(WAIT, async {
        loop {
            let reply = replies.recv().await.expect("reply channel closed");
            if reply.envelope_id == envelope_id {
                return reply;
            }
        }
    })
    .await
    .expect("timed out waiting for command reply")
}

/// Wait for the next started-job notification.
pub async fn await_started(started: &mut mpsc::UnboundedReceiver<Uuid>) -> Uuid {
    tokio::time::timeout(WAIT, started.recv())
        .await
        .expect("timed out waiting for a job to start")
        .expect("executor notification channel closed")
}
