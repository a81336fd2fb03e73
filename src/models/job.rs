use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Initial state when a job is submitted to the pending queue
    Submitted,
    /// Job is currently being executed
    Running,
    /// Job completed successfully
    Complete,
    /// Job failed with an error
    Failed,
    /// Job was cancelled before or during execution
    Terminated,
}

impl JobStatus {
    /// Check if this is a final status (the job will never run again)
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Terminated)
    }

    /// Check if the job has left the pending queue
    pub fn is_started(&self) -> bool {
        !matches!(self, Self::Submitted)
    }

    /// Check if the job is actively executing
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Submitted
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "running" => Ok(Self::Running),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            "terminated" => Ok(Self::Terminated),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

/// One unit of submitted work.
///
/// The identifier is assigned at creation and never changes; everything else
/// is mutated by the consumer core as the job moves through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique identifier, immutable for the record's lifetime
    pub job_id: Uuid,
    /// Display name for clients and logs
    pub name: String,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Progress through the work, 0.0 to 100.0
    pub percent_complete: f64,
    /// Free-text status message, set on failure or termination
    pub message: Option<String>,
    /// When the record was created
    pub submission_time: DateTime<Utc>,
}

impl JobRecord {
    /// Create a new record in the `Submitted` state
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            name: name.into(),
            status: JobStatus::Submitted,
            percent_complete: 0.0,
            message: None,
            submission_time: Utc::now(),
        }
    }

    /// Mark the record as actively executing
    pub fn begin(&mut self) {
        self.status = JobStatus::Running;
    }

    /// Mark the record complete with full progress
    pub fn complete(&mut self) {
        self.status = JobStatus::Complete;
        self.percent_complete = 100.0;
    }

    /// Mark the record failed with the given message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.message = Some(message.into());
    }

    /// Mark the record terminated with the given message
    pub fn terminate(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Terminated;
        self.message = Some(message.into());
    }

    /// Age of the record since submission
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.submission_time
    }
}
