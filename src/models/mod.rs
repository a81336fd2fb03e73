//! Data models for the queue-consumer core

pub mod consumer_info;
pub mod job;

pub use consumer_info::ConsumerInfo;
pub use job::{JobRecord, JobStatus};
