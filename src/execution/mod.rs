//! Job execution seam

pub mod executor;

pub use executor::{
    cancellation_pair, CancelHandle, CancellationSignal, ExecutionContext, JobExecutor,
};
