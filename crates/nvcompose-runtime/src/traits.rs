//! Seams between the merge and the outside world

use async_trait::async_trait;
use nvcompose_core::{ComposeResult, GpuDeviceSet};
use std::path::Path;

/// Source of the GPU devices and driver volumes to inject
#[async_trait]
pub trait GpuRuntime: Send + Sync {
    /// Query the devices and driver volumes once
    async fn query(&self) -> ComposeResult<GpuDeviceSet>;

    /// Get the runtime name
    fn name(&self) -> &'static str;
}

/// Runs the wrapped orchestration tool against a compose file
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run with `compose_file` as input and `args` forwarded verbatim,
    /// returning the tool's exit code
    async fn execute(&self, compose_file: &Path, args: &[String]) -> ComposeResult<i32>;

    /// Get the executor name
    fn name(&self) -> &'static str;
}
