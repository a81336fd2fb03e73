//! Status event broadcasting

pub mod broadcaster;

pub use broadcaster::{
    ConsumerStatusEvent, JobStatusEvent, QueueStatusListener, StatusBroadcaster, StatusEvent,
};
