//! Ordered queue store: pending, running and completed collections.
//!
//! The store has no locking of its own. It is owned by a single consumer
//! task and every operation, including the worker's own pop, is serialized
//! through that task's mailbox, so no caller can observe it mid-mutation.

use std::collections::VecDeque;

use chrono::Duration;
use uuid::Uuid;

use crate::models::{JobRecord, JobStatus};

/// Typed failure modes for store mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueStoreError {
    #[error("no job with id {0} in the pending queue")]
    UnknownPendingJob(Uuid),
    #[error("no job with id {0} in the completed history")]
    UnknownCompletedJob(Uuid),
    #[error("job {0} is already at the head of the pending queue")]
    AlreadyAtHead(Uuid),
    #[error("job {0} is already at the tail of the pending queue")]
    AlreadyAtTail(Uuid),
    #[error("job {0} is currently running and cannot be removed")]
    JobRunning(Uuid),
    #[error("job {0} is not the running job")]
    NotRunning(Uuid),
    #[error("a job with id {0} is already present")]
    DuplicateJob(Uuid),
}

/// Per-queue collections: an ordered pending queue, at most one running
/// job, and a bounded completed history (oldest evicted first).
///
/// Invariant: a job id appears in at most one collection at any instant.
#[derive(Debug)]
pub struct QueueStore {
    pending: VecDeque<JobRecord>,
    running: Option<JobRecord>,
    completed: VecDeque<JobRecord>,
    completed_capacity: usize,
}

impl QueueStore {
    pub fn new(completed_capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            running: None,
            completed: VecDeque::new(),
            completed_capacity,
        }
    }

    /// Append a record to the tail of the pending queue.
    ///
    /// Rejects an id already present in any collection.
    pub fn submit(&mut self, job: JobRecord) -> Result<(), QueueStoreError> {
        if self.contains(job.job_id) {
            return Err(QueueStoreError::DuplicateJob(job.job_id));
        }
        self.pending.push_back(job);
        Ok(())
    }

    /// Pop the head of the pending queue into the running slot.
    ///
    /// The returned record (and the stored running copy) is already marked
    /// `Running`. Returns `None` when the pending queue is empty or a job
    /// is still in the running slot.
    pub fn take_next(&mut self) -> Option<JobRecord> {
        if self.running.is_some() {
            return None;
        }
        let mut job = self.pending.pop_front()?;
        job.begin();
        self.running = Some(job.clone());
        Some(job)
    }

    /// Move the finished record out of the running slot into the completed
    /// history, evicting the oldest entries once over capacity.
    pub fn finish_running(&mut self, job: JobRecord) -> Result<(), QueueStoreError> {
        match &self.running {
            Some(running) if running.job_id == job.job_id => {
                self.running = None;
                self.completed.push_back(job);
                while self.completed.len() > self.completed_capacity {
                    self.completed.pop_front();
                }
                Ok(())
            }
            _ => Err(QueueStoreError::NotRunning(job.job_id)),
        }
    }

    /// Swap the record one position toward the head of the pending queue
    pub fn move_forward(&mut self, job_id: Uuid) -> Result<(), QueueStoreError> {
        let index = self
            .pending_index(job_id)
            .ok_or(QueueStoreError::UnknownPendingJob(job_id))?;
        if index == 0 {
            return Err(QueueStoreError::AlreadyAtHead(job_id));
        }
        self.pending.swap(index, index - 1);
        Ok(())
    }

    /// Swap the record one position toward the tail of the pending queue
    pub fn move_backward(&mut self, job_id: Uuid) -> Result<(), QueueStoreError> {
        let index = self
            .pending_index(job_id)
            .ok_or(QueueStoreError::UnknownPendingJob(job_id))?;
        if index + 1 == self.pending.len() {
            return Err(QueueStoreError::AlreadyAtTail(job_id));
        }
        self.pending.swap(index, index + 1);
        Ok(())
    }

    /// Delete the record from the pending queue.
    ///
    /// The running job is explicitly protected: removing it is an error and
    /// has no effect on the execution in flight.
    pub fn remove(&mut self, job_id: Uuid) -> Result<JobRecord, QueueStoreError> {
        if self.running.as_ref().is_some_and(|job| job.job_id == job_id) {
            return Err(QueueStoreError::JobRunning(job_id));
        }
        let index = self
            .pending_index(job_id)
            .ok_or(QueueStoreError::UnknownPendingJob(job_id))?;
        self.pending
            .remove(index)
            .ok_or(QueueStoreError::UnknownPendingJob(job_id))
    }

    /// Delete the record from the completed history
    pub fn remove_completed(&mut self, job_id: Uuid) -> Result<JobRecord, QueueStoreError> {
        let index = self
            .completed
            .iter()
            .position(|job| job.job_id == job_id)
            .ok_or(QueueStoreError::UnknownCompletedJob(job_id))?;
        self.completed
            .remove(index)
            .ok_or(QueueStoreError::UnknownCompletedJob(job_id))
    }

    /// Empty the pending queue, returning the number of records dropped.
    /// Running and completed are untouched.
    pub fn clear(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        cleared
    }

    /// Empty the completed history, returning the number of records dropped
    pub fn clear_completed(&mut self) -> usize {
        let cleared = self.completed.len();
        self.completed.clear();
        cleared
    }

    /// Replace the stored copy of a job by id, wherever it lives.
    ///
    /// Used for status echoes arriving from the status channel; returns
    /// whether a copy was found.
    pub fn update(&mut self, job: &JobRecord) -> bool {
        if let Some(stored) = self.pending.iter_mut().find(|j| j.job_id == job.job_id) {
            *stored = job.clone();
            return true;
        }
        if let Some(running) = &mut self.running {
            if running.job_id == job.job_id {
                *running = job.clone();
                return true;
            }
        }
        if let Some(stored) = self.completed.iter_mut().find(|j| j.job_id == job.job_id) {
            *stored = job.clone();
            return true;
        }
        false
    }

    /// Drop failed records and finished records older than `max_age` from
    /// the completed history, returning the number dropped.
    pub fn housekeep_completed(&mut self, max_age: Duration) -> usize {
        let before = self.completed.len();
        self.completed.retain(|job| {
            job.status != JobStatus::Failed && !(job.status.is_final() && job.age() > max_age)
        });
        before - self.completed.len()
    }

    /// Ordered copy of the pending queue
    pub fn pending_snapshot(&self) -> Vec<JobRecord> {
        self.pending.iter().cloned().collect()
    }

    /// Completed history in start order, with the running job last
    pub fn running_and_completed_snapshot(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.completed.iter().cloned().collect();
        if let Some(running) = &self.running {
            jobs.push(running.clone());
        }
        jobs
    }

    pub fn running(&self) -> Option<&JobRecord> {
        self.running.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_pending_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn pending_index(&self, job_id: Uuid) -> Option<usize> {
        self.pending.iter().position(|job| job.job_id == job_id)
    }

    fn contains(&self, job_id: Uuid) -> bool {
        self.pending_index(job_id).is_some()
            || self.running.as_ref().is_some_and(|job| job.job_id == job_id)
            || self.completed.iter().any(|job| job.job_id == job_id)
    }
}
