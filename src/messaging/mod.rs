//! Command envelopes and the bus seam

pub mod bus;
pub mod envelope;

pub use bus::{InProcessBus, PublishError, ReplyPublisher};
pub use envelope::{CommandEnvelope, QueueCommand, ReplyPayload};
