#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Scanq Core
//!
//! Rust core for remotely controllable experiment job queues, designed to
//! complement beamline acquisition servers.
//!
//! ## Overview
//!
//! Experiment jobs are submitted to a named queue and drained one at a time
//! by a single consumer. Any number of remote clients steer the consumer
//! over an asynchronous message bus: pause, resume, stop, reorder, remove
//! and query commands arrive as addressed [`messaging::CommandEnvelope`]s,
//! are filtered and delivered by the [`router::CommandRouter`], and every
//! observable change is broadcast to local listeners and remote observers
//! through the [`events::StatusBroadcaster`].
//!
//! ## Architecture
//!
//! Each consumer is a single actor task that owns its
//! [`queue::QueueStore`] and state machine outright. Commands, job
//! submissions and the worker's own completion notices share one mailbox,
//! so queue mutations are atomic with respect to the draining loop by
//! construction rather than by locking. The scientific work itself is
//! behind the [`execution::JobExecutor`] seam; the transport is behind the
//! [`messaging::ReplyPublisher`] seam and the status broadcast channel.
//!
//! ## Module Organization
//!
//! - [`models`] - Job records and consumer identity snapshots
//! - [`messaging`] - Command envelopes, addressing and the bus seam
//! - [`queue`] - The ordered pending/running/completed store
//! - [`consumer`] - The state machine and actor loop
//! - [`router`] - Registry and envelope dispatch
//! - [`events`] - Status broadcasting to listeners and the bus
//! - [`execution`] - The pluggable job execution seam
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scanq_core::config::ScanqConfig;
//! use scanq_core::consumer::QueueConsumer;
//! use scanq_core::messaging::{CommandEnvelope, InProcessBus, QueueCommand};
//! use scanq_core::router::{CommandRouter, ConsumerRegistry};
//! # use scanq_core::execution::{CancellationSignal, ExecutionContext, JobExecutor};
//! # use scanq_core::models::JobRecord;
//! # struct MyExecutor;
//! # #[async_trait::async_trait]
//! # impl JobExecutor for MyExecutor {
//! #     async fn execute(&self, _job: &mut JobRecord, _ctx: &ExecutionContext,
//! #         _cancel: CancellationSignal) -> anyhow::Result<()> { Ok(()) }
//! # }
//!
//! # async fn example() -> scanq_core::Result<()> {
//! let bus = Arc::new(InProcessBus::default());
//! let consumer = QueueConsumer::spawn(
//!     "i22.submission",
//!     Arc::new(MyExecutor),
//!     bus.clone(),
//!     ScanqConfig::from_env()?,
//! );
//!
//! let registry = Arc::new(ConsumerRegistry::new());
//! registry.register(consumer.handle()).unwrap();
//! let router = CommandRouter::new(registry);
//!
//! // A remote client pauses every consumer on the queue
//! router
//!     .dispatch(CommandEnvelope::for_queue("i22.submission", QueueCommand::Pause))
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod queue;
pub mod router;

pub use config::ScanqConfig;
pub use consumer::{ConsumerHandle, ConsumerState, QueueConsumer};
pub use error::{Result, ScanqError};
pub use events::{
    ConsumerStatusEvent, JobStatusEvent, QueueStatusListener, StatusBroadcaster, StatusEvent,
};
pub use execution::{CancelHandle, CancellationSignal, ExecutionContext, JobExecutor};
pub use messaging::{
    CommandEnvelope, InProcessBus, PublishError, QueueCommand, ReplyPayload, ReplyPublisher,
};
pub use models::{ConsumerInfo, JobRecord, JobStatus};
pub use queue::{QueueStore, QueueStoreError};
pub use router::{CommandRouter, ConsumerRegistry, RegistryError};
