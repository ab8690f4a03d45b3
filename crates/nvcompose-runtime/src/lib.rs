//! nvcompose-runtime: Everything that talks to the host
//!
//! This crate provides:
//! - GPU runtime backends (nvidia-docker plugin, nvidia-container-cli)
//! - A process executor that delegates to docker-compose
//! - The invocation pipeline tying both to the merge

pub mod container_cli;
pub mod plugin;
pub mod process;
pub mod traits;
pub mod wrapper;

pub use container_cli::ContainerCliRuntime;
pub use plugin::PluginRuntime;
pub use process::{ProcessExecutor, ProcessExecutorConfig};
pub use traits::{Executor, GpuRuntime};
pub use wrapper::{Invocation, Outcome, Wrapper};
