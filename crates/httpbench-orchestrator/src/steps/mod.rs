//! The built-in pipeline steps.

mod provision;
mod sinks;
mod streaming;
mod wait;

pub use provision::{
    CreateContainersStep, EnsureImagesStep, EnsureNetworksStep, RemoveContainersStep,
    StartContainersStep, StopContainersStep,
};
pub use sinks::CloseSinksStep;
pub use streaming::{worker_channel, StreamLogsStep, StreamStatsStep, WorkerTracker, WorkerWaiter};
pub use wait::WaitContainersStep;
