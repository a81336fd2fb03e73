//! The consumer core: one actor task per named queue.
//!
//! The task owns the queue store and the state machine outright. Command
//! envelopes, job submissions, status echoes and the worker's own
//! completion notices all arrive through one mailbox, so every operation
//! on the store, including the pop that feeds the worker, is atomic with
//! respect to every other.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ScanqConfig;
use crate::constants::events;
use crate::consumer::handle::{ConsumerHandle, ConsumerMessage};
use crate::consumer::state::ConsumerState;
use crate::error::{Result, ScanqError};
use crate::events::{ConsumerStatusEvent, JobStatusEvent, StatusBroadcaster, StatusEvent};
use crate::execution::{cancellation_pair, CancelHandle, ExecutionContext, JobExecutor};
use crate::messaging::{CommandEnvelope, QueueCommand, ReplyPayload, ReplyPublisher};
use crate::models::{ConsumerInfo, JobRecord};
use crate::queue::QueueStore;

/// A spawned queue consumer.
///
/// Owns the background task draining one named queue. Dropping this struct
/// does not stop the task; use [`QueueConsumer::shutdown`] or
/// [`ConsumerHandle::disconnect`] for an orderly teardown.
#[derive(Debug)]
pub struct QueueConsumer {
    handle: ConsumerHandle,
    broadcaster: StatusBroadcaster,
    join: JoinHandle<()>,
}

impl QueueConsumer {
    /// Spawn a consumer for the named queue.
    ///
    /// The consumer starts in the `Running` state with empty collections.
    pub fn spawn(
        queue_name: impl Into<String>,
        executor: Arc<dyn JobExecutor>,
        replies: Arc<dyn ReplyPublisher>,
        config: ScanqConfig,
    ) -> Self {
        Self::spawn_with_pending(queue_name, executor, replies, config, Vec::new())
    }

    /// Spawn a consumer with a restored pending queue.
    ///
    /// Used when an external persistence collaborator hands back a pending
    /// snapshot from a previous process. With `pause_on_start` set and a
    /// non-empty restored queue, the consumer initializes into `Paused` so
    /// an operator can inspect the queue before anything runs.
    pub fn spawn_with_pending(
        queue_name: impl Into<String>,
        executor: Arc<dyn JobExecutor>,
        replies: Arc<dyn ReplyPublisher>,
        config: ScanqConfig,
        restored: Vec<JobRecord>,
    ) -> Self {
        let consumer_id = Uuid::new_v4();
        let queue_name = queue_name.into();
        let name = format!("Consumer {consumer_id}");

        let broadcaster = StatusBroadcaster::new(config.status_channel_capacity);
        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let (state_tx, state_rx) = watch::channel(ConsumerState::Running);

        let mut store = QueueStore::new(config.completed_capacity);
        for job in restored {
            if let Err(e) = store.submit(job) {
                warn!(queue_name = %queue_name, error = %e, "Dropped restored job");
            }
        }

        let core = ConsumerCore {
            consumer_id,
            name: name.clone(),
            queue_name: queue_name.clone(),
            state: ConsumerState::Running,
            store,
            executor,
            replies,
            broadcaster: broadcaster.clone(),
            rx,
            self_tx: tx.clone(),
            state_tx,
            in_flight: None,
            cancel_requested: false,
            disconnecting: false,
            last_error: None,
            started_at: Utc::now(),
            completed_max_age: Duration::seconds(config.completed_max_age_secs as i64),
            pause_on_start: config.pause_on_start,
            host_name: std::env::var("HOSTNAME").ok(),
        };

        let join = tokio::spawn(core.run());
        let handle = ConsumerHandle::new(consumer_id, name, queue_name, tx, state_rx);

        Self {
            handle,
            broadcaster,
            join,
        }
    }

    /// Cloneable address of this consumer
    pub fn handle(&self) -> ConsumerHandle {
        self.handle.clone()
    }

    pub fn consumer_id(&self) -> Uuid {
        self.handle.consumer_id()
    }

    pub fn queue_name(&self) -> &str {
        self.handle.queue_name()
    }

    /// The broadcaster carrying this consumer's status events
    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }

    /// Subscribe to the status event stream
    pub fn status_events(&self) -> broadcast::Receiver<StatusEvent> {
        self.broadcaster.subscribe()
    }

    /// Disconnect the consumer and wait for its task to drain and exit
    pub async fn shutdown(self) -> Result<()> {
        // Ignore a closed mailbox: the loop is already on its way out
        let _ = self.handle.disconnect().await;
        self.join.await.map_err(|e| {
            ScanqError::QueueError(format!(
                "consumer task for queue {} failed: {e}",
                self.handle.queue_name()
            ))
        })
    }
}

struct InFlight {
    job_id: Uuid,
    cancel: CancelHandle,
}

struct ConsumerCore {
    consumer_id: Uuid,
    name: String,
    queue_name: String,
    state: ConsumerState,
    store: QueueStore,
    executor: Arc<dyn JobExecutor>,
    replies: Arc<dyn ReplyPublisher>,
    broadcaster: StatusBroadcaster,
    rx: mpsc::Receiver<ConsumerMessage>,
    self_tx: mpsc::Sender<ConsumerMessage>,
    state_tx: watch::Sender<ConsumerState>,
    in_flight: Option<InFlight>,
    cancel_requested: bool,
    disconnecting: bool,
    last_error: Option<String>,
    started_at: DateTime<Utc>,
    completed_max_age: Duration,
    pause_on_start: bool,
    host_name: Option<String>,
}

impl ConsumerCore {
    async fn run(mut self) {
        info!(
            consumer_id = %self.consumer_id,
            queue_name = %self.queue_name,
            "Consumer loop starting"
        );

        self.store.housekeep_completed(self.completed_max_age);

        // On a restart with work already queued, an operator must resume
        // explicitly before anything runs.
        if self.pause_on_start && !self.store.is_pending_empty() {
            self.state = ConsumerState::Paused;
            let _ = self.state_tx.send(self.state);
        }
        info!(
            consumer_id = %self.consumer_id,
            queue_name = %self.queue_name,
            state = %self.state,
            "{}", events::CONSUMER_STARTED
        );
        self.publish_consumer_status();

        loop {
            if self.disconnecting && self.in_flight.is_none() {
                break;
            }
            self.start_next_job();
            let Some(message) = self.rx.recv().await else {
                break;
            };
            self.handle_message(message).await;
        }

        info!(
            consumer_id = %self.consumer_id,
            queue_name = %self.queue_name,
            "Consumer loop exiting"
        );
    }

    async fn handle_message(&mut self, message: ConsumerMessage) {
        match message {
            ConsumerMessage::Envelope(envelope) => {
                // The router already filters by addressing; a misdirected
                // direct delivery must still be ignored without side effects.
                if !envelope.is_addressed_to(self.consumer_id, &self.queue_name) {
                    debug!(
                        envelope_id = %envelope.envelope_id,
                        command = envelope.command.name(),
                        "Ignoring envelope not addressed to this consumer"
                    );
                    return;
                }
                self.handle_command(envelope).await;
            }
            ConsumerMessage::Submit(job) => self.handle_submit(job),
            ConsumerMessage::UpdateJob(job) => {
                if !self.store.update(&job) {
                    debug!(job_id = %job.job_id, "Status echo for unknown job ignored");
                }
            }
            ConsumerMessage::JobFinished { job, outcome } => self.handle_job_finished(job, outcome),
            ConsumerMessage::Disconnect => {
                if !self.state.is_terminal() {
                    self.stop_consumer();
                }
                self.disconnecting = true;
            }
        }
    }

    fn handle_submit(&mut self, job: JobRecord) {
        let snapshot = job.clone();
        match self.store.submit(job) {
            Ok(()) => {
                info!(
                    queue_name = %self.queue_name,
                    job_id = %snapshot.job_id,
                    pending = self.store.pending_len(),
                    "{}", events::JOB_SUBMITTED
                );
                self.publish_job_status(snapshot);
            }
            Err(e) => {
                warn!(queue_name = %self.queue_name, error = %e, "Rejected submission");
            }
        }
    }

    fn handle_job_finished(&mut self, mut job: JobRecord, outcome: anyhow::Result<()>) {
        match outcome {
            Ok(()) => job.complete(),
            Err(e) => {
                if self.cancel_requested {
                    job.terminate(format!("Cancelled on stop: {e}"));
                } else {
                    job.fail(e.to_string());
                }
            }
        }

        info!(
            queue_name = %self.queue_name,
            job_id = %job.job_id,
            status = %job.status,
            "Job finished"
        );

        if let Err(e) = self.store.finish_running(job.clone()) {
            error!(
                queue_name = %self.queue_name,
                job_id = %job.job_id,
                error = %e,
                "Finished job did not match the running slot"
            );
        }
        self.store.housekeep_completed(self.completed_max_age);
        self.publish_job_status(job);

        self.in_flight = None;
        self.cancel_requested = false;
    }

    fn start_next_job(&mut self) {
        if self.state != ConsumerState::Running || self.in_flight.is_some() {
            return;
        }
        let Some(job) = self.store.take_next() else {
            return;
        };

        info!(
            queue_name = %self.queue_name,
            job_id = %job.job_id,
            job_name = %job.name,
            "Starting job"
        );
        self.publish_job_status(job.clone());

        let (cancel_handle, cancel_signal) = cancellation_pair();
        self.in_flight = Some(InFlight {
            job_id: job.job_id,
            cancel: cancel_handle,
        });

        let executor = Arc::clone(&self.executor);
        let ctx = ExecutionContext::new(self.queue_name.clone(), self.broadcaster.clone());
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let mut job = job;
            let outcome = executor.execute(&mut job, &ctx, cancel_signal).await;
            // A closed mailbox means the consumer is gone; nothing to report to
            let _ = tx.send(ConsumerMessage::JobFinished { job, outcome }).await;
        });
    }

    async fn handle_command(&mut self, envelope: CommandEnvelope) {
        debug!(
            queue_name = %self.queue_name,
            envelope_id = %envelope.envelope_id,
            command = envelope.command.name(),
            "Processing command"
        );

        let command_name = envelope.command.name();
        let result: Result<Option<ReplyPayload>> = match &envelope.command {
            QueueCommand::Pause => self.pause().map(|_| None),
            QueueCommand::Resume => self.resume().map(|_| None),
            QueueCommand::Stop => {
                self.stop_consumer();
                Ok(None)
            }
            QueueCommand::Restart => self.restart().map(|_| None),
            QueueCommand::Clear => {
                let cleared = self.store.clear();
                info!(queue_name = %self.queue_name, cleared, "Cleared pending queue");
                Ok(None)
            }
            QueueCommand::ClearCompleted => {
                let cleared = self.store.clear_completed();
                info!(queue_name = %self.queue_name, cleared, "Cleared completed history");
                Ok(None)
            }
            QueueCommand::MoveForward { job_id } => self
                .store
                .move_forward(*job_id)
                .map(|_| None)
                .map_err(|e| ScanqError::QueueError(e.to_string())),
            QueueCommand::MoveBackward { job_id } => self
                .store
                .move_backward(*job_id)
                .map(|_| None)
                .map_err(|e| ScanqError::QueueError(e.to_string())),
            QueueCommand::Remove { job_id } => self
                .store
                .remove(*job_id)
                .map(|_| None)
                .map_err(|e| ScanqError::QueueError(e.to_string())),
            QueueCommand::RemoveCompleted { job_id } => self
                .store
                .remove_completed(*job_id)
                .map(|_| None)
                .map_err(|e| ScanqError::QueueError(e.to_string())),
            QueueCommand::GetQueue => Ok(Some(ReplyPayload::PendingJobs(
                self.store.pending_snapshot(),
            ))),
            QueueCommand::GetRunningAndCompleted => Ok(Some(ReplyPayload::RunningAndCompleted(
                self.store.running_and_completed_snapshot(),
            ))),
            QueueCommand::GetInfo => Ok(Some(ReplyPayload::ConsumerInfo(self.info()))),
        };

        let reply = match result {
            Ok(payload) => envelope.into_reply(payload),
            Err(e) => {
                let message = format!(
                    "Could not process {command_name} command for queue {}: {e}",
                    self.queue_name
                );
                warn!(queue_name = %self.queue_name, error = %e, command = command_name, "Command failed");
                self.last_error = Some(message.clone());
                envelope.into_error_reply(message)
            }
        };

        if let Err(e) = self.replies.publish_reply(reply).await {
            error!(
                queue_name = %self.queue_name,
                error = %e,
                "Could not publish acknowledgement for command"
            );
        }
    }

    fn pause(&mut self) -> Result<()> {
        match self.state {
            ConsumerState::Running => {
                self.transition(ConsumerState::Paused, events::CONSUMER_PAUSED);
                Ok(())
            }
            // Already holding; nothing to do
            ConsumerState::Paused => Ok(()),
            ConsumerState::Stopped => Err(self.stopped_error()),
        }
    }

    fn resume(&mut self) -> Result<()> {
        match self.state {
            ConsumerState::Paused => {
                self.transition(ConsumerState::Running, events::CONSUMER_RESUMED);
                Ok(())
            }
            ConsumerState::Running => Ok(()),
            ConsumerState::Stopped => Err(self.stopped_error()),
        }
    }

    fn stop_consumer(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(in_flight) = &self.in_flight {
            info!(
                queue_name = %self.queue_name,
                job_id = %in_flight.job_id,
                "Requesting cancellation of in-flight job"
            );
            in_flight.cancel.cancel();
            self.cancel_requested = true;
        }
        self.transition(ConsumerState::Stopped, events::CONSUMER_STOPPED);
    }

    /// Re-initialize the worker loop bookkeeping in place.
    ///
    /// A stopped consumer cannot be restarted; there is deliberately no
    /// path out of the terminal state.
    fn restart(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(ScanqError::StateTransitionError(format!(
                "cannot restart the stopped consumer for queue {}",
                self.queue_name
            )));
        }
        self.cancel_requested = false;
        self.last_error = None;
        self.store.housekeep_completed(self.completed_max_age);
        info!(
            queue_name = %self.queue_name,
            state = %self.state,
            "{}", events::CONSUMER_RESTARTED
        );
        self.publish_consumer_status();
        Ok(())
    }

    fn stopped_error(&self) -> ScanqError {
        ScanqError::StateTransitionError(format!(
            "consumer for queue {} is stopped",
            self.queue_name
        ))
    }

    fn transition(&mut self, state: ConsumerState, event: &'static str) {
        self.state = state;
        let _ = self.state_tx.send(state);
        info!(
            consumer_id = %self.consumer_id,
            queue_name = %self.queue_name,
            state = %state,
            "{event}"
        );
        // Observers must never see a stale state after a command has been
        // acknowledged, so the broadcast happens before the reply goes out.
        self.publish_consumer_status();
    }

    fn publish_consumer_status(&self) {
        self.broadcaster.broadcast_consumer(ConsumerStatusEvent {
            consumer_id: self.consumer_id,
            consumer_name: self.name.clone(),
            queue_name: self.queue_name.clone(),
            state: self.state,
            host_name: self.host_name.clone(),
            publish_time: Utc::now(),
        });
    }

    fn publish_job_status(&self, job: JobRecord) {
        self.broadcaster.broadcast_job(JobStatusEvent {
            queue_name: self.queue_name.clone(),
            job,
            publish_time: Utc::now(),
        });
    }

    fn info(&self) -> ConsumerInfo {
        ConsumerInfo {
            consumer_id: self.consumer_id,
            name: self.name.clone(),
            queue_name: self.queue_name.clone(),
            state: self.state,
            host_name: self.host_name.clone(),
            last_error: self.last_error.clone(),
            started_at: self.started_at,
        }
    }
}
