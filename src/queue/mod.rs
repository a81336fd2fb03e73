//! Ordered queue store

pub mod store;

pub use store::{QueueStore, QueueStoreError};
