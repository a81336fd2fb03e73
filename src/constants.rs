//! # System Constants
//!
//! Core constants that define the operational boundaries of the scanq
//! queue-consumer system: lifecycle event names, default channel and history
//! capacities, and the environment variables the configuration layer reads.

/// Lifecycle events published on the status channel and used in structured logs
pub mod events {
    // Consumer lifecycle events
    pub const CONSUMER_STARTED: &str = "consumer.started";
    pub const CONSUMER_PAUSED: &str = "consumer.paused";
    pub const CONSUMER_RESUMED: &str = "consumer.resumed";
    pub const CONSUMER_RESTARTED: &str = "consumer.restarted";
    pub const CONSUMER_STOPPED: &str = "consumer.stopped";

    // Job lifecycle events
    pub const JOB_SUBMITTED: &str = "job.submitted";
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_COMPLETED: &str = "job.completed";
    pub const JOB_FAILED: &str = "job.failed";
    pub const JOB_TERMINATED: &str = "job.terminated";
}

/// Default logical channel names for the message-bus surface.
///
/// The bus client owns the mapping onto real topics; these are the
/// conventional names used when nothing else is configured.
pub mod topics {
    pub const DEFAULT_COMMAND_TOPIC: &str = "scanq.command";
    pub const DEFAULT_COMMAND_ACK_TOPIC: &str = "scanq.command.ack";
    pub const DEFAULT_STATUS_TOPIC: &str = "scanq.status";
}

/// System defaults for capacities and timing
pub mod system {
    /// Completed-history entries kept per queue before FIFO eviction
    pub const DEFAULT_COMPLETED_CAPACITY: usize = 100;

    /// Age after which finished records are dropped by housekeeping
    pub const DEFAULT_COMPLETED_MAX_AGE_SECS: u64 = 24 * 60 * 60;

    /// Consumer mailbox depth (commands, submissions, completion notices)
    pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

    /// Status broadcast channel depth for remote observers
    pub const DEFAULT_STATUS_CHANNEL_CAPACITY: usize = 1000;
}

/// Environment variable names read by [`crate::config::ScanqConfig::from_env`]
pub mod env {
    pub const COMPLETED_CAPACITY: &str = "SCANQ_COMPLETED_CAPACITY";
    pub const COMPLETED_MAX_AGE_SECS: &str = "SCANQ_COMPLETED_MAX_AGE_SECS";
    pub const MAILBOX_CAPACITY: &str = "SCANQ_MAILBOX_CAPACITY";
    pub const STATUS_CHANNEL_CAPACITY: &str = "SCANQ_STATUS_CHANNEL_CAPACITY";
    pub const PAUSE_ON_START: &str = "SCANQ_PAUSE_ON_START";
}
