use crate::constants::{env as env_vars, system};
use crate::error::{Result, ScanqError};

/// Runtime configuration for a queue consumer.
///
/// Everything here is a policy knob rather than a wiring concern: bus
/// connection details belong to the embedding process, not this crate.
#[derive(Debug, Clone)]
pub struct ScanqConfig {
    /// Completed-history entries kept before the oldest is evicted
    pub completed_capacity: usize,
    /// Age in seconds after which finished records are dropped by housekeeping
    pub completed_max_age_secs: u64,
    /// Depth of the consumer mailbox channel
    pub mailbox_capacity: usize,
    /// Depth of the status broadcast channel
    pub status_channel_capacity: usize,
    /// Start paused when the pending queue is non-empty at startup
    pub pause_on_start: bool,
}

impl Default for ScanqConfig {
    fn default() -> Self {
        Self {
            completed_capacity: system::DEFAULT_COMPLETED_CAPACITY,
            completed_max_age_secs: system::DEFAULT_COMPLETED_MAX_AGE_SECS,
            mailbox_capacity: system::DEFAULT_MAILBOX_CAPACITY,
            status_channel_capacity: system::DEFAULT_STATUS_CHANNEL_CAPACITY,
            pause_on_start: false,
        }
    }
}

impl ScanqConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(capacity) = std::env::var(env_vars::COMPLETED_CAPACITY) {
            config.completed_capacity = capacity.parse().map_err(|e| {
                ScanqError::ConfigurationError(format!("Invalid completed_capacity: {e}"))
            })?;
        }

        if let Ok(max_age) = std::env::var(env_vars::COMPLETED_MAX_AGE_SECS) {
            config.completed_max_age_secs = max_age.parse().map_err(|e| {
                ScanqError::ConfigurationError(format!("Invalid completed_max_age_secs: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var(env_vars::MAILBOX_CAPACITY) {
            config.mailbox_capacity = capacity.parse().map_err(|e| {
                ScanqError::ConfigurationError(format!("Invalid mailbox_capacity: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var(env_vars::STATUS_CHANNEL_CAPACITY) {
            config.status_channel_capacity = capacity.parse().map_err(|e| {
                ScanqError::ConfigurationError(format!("Invalid status_channel_capacity: {e}"))
            })?;
        }

        if let Ok(pause) = std::env::var(env_vars::PAUSE_ON_START) {
            config.pause_on_start = pause.parse().map_err(|e| {
                ScanqError::ConfigurationError(format!("Invalid pause_on_start: {e}"))
            })?;
        }

        Ok(config)
    }
}
