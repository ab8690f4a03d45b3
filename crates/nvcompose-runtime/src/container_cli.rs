//! nvidia-container-cli runtime
//!
//! Used on hosts running the NVIDIA container toolkit instead of the
//! nvidia-docker plugin. `nvidia-container-cli list` prints one host
//! path per line: device nodes, which become device entries, and driver
//! files (libraries, binaries, IPC sockets), which become read-only
//! bind mounts at the same path.

use async_trait::async_trait;
use nvcompose_core::{ComposeError, ComposeResult, GpuDeviceSet};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::traits::GpuRuntime;

/// GPU runtime backed by `nvidia-container-cli list`
pub struct ContainerCliRuntime {
    /// Path to the nvidia-container-cli binary
    cli_path: PathBuf,
    /// GPU indices to list; `None` lists every GPU
    gpus: Option<Vec<u32>>,
}

impl ContainerCliRuntime {
    /// Create a new container-cli runtime
    pub fn new(cli_path: PathBuf, gpus: Option<Vec<u32>>) -> Self {
        Self { cli_path, gpus }
    }

    /// Build the listing command
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_path);
        cmd.arg("list");

        let selection = match &self.gpus {
            Some(indices) => indices
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(","),
            None => "all".to_string(),
        };
        cmd.arg(format!("--device={}", selection));

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl GpuRuntime for ContainerCliRuntime {
    async fn query(&self) -> ComposeResult<GpuDeviceSet> {
        debug!(cli = %self.cli_path.display(), gpus = ?self.gpus, "Listing driver files");

        let output = self.build_command().output().await.map_err(|e| {
            ComposeError::RuntimeQuery(format!(
                "Failed to run {}: {}",
                self.cli_path.display(),
                e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ComposeError::RuntimeQuery(format!(
                "{} exited with {}: {}",
                self.cli_path.display(),
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| {
            ComposeError::RuntimeQuery(format!("Malformed listing output: {}", e))
        })?;
        let set = parse_listing(&stdout);

        info!(
            devices = set.devices.len(),
            volumes = set.volumes.len(),
            "Received GPU devices from nvidia-container-cli"
        );

        Ok(set)
    }

    fn name(&self) -> &'static str {
        "container-cli"
    }
}

/// Split a `nvidia-container-cli list` listing into devices and volumes
pub fn parse_listing(listing: &str) -> GpuDeviceSet {
    let mut set = GpuDeviceSet::empty();

    for path in listing.lines().map(str::trim).filter(|l| l.starts_with('/')) {
        if path.starts_with("/dev/") {
            if !set.devices.iter().any(|d| d == path) {
                set.devices.push(path.to_string());
            }
        } else {
            let volume = format!("{}:{}:ro", path, path);
            if !set.volumes.contains(&volume) {
                set.volumes.push(volume);
            }
        }
    }

    set
}
