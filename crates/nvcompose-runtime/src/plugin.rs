//! nvidia-docker plugin runtime
//!
//! Queries the plugin's REST endpoint (`/docker/cli/json`) for the
//! devices and driver volumes `nvidia-docker` would add to `docker run`.

use async_trait::async_trait;
use nvcompose_core::{ComposeError, ComposeResult, GpuDeviceSet};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::traits::GpuRuntime;

const CLI_JSON_PATH: &str = "/docker/cli/json";

/// Payload returned by `/docker/cli/json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginResponse {
    #[serde(default)]
    pub volume_driver: Option<String>,
    #[serde(default)]
    pub volumes: Option<Vec<String>>,
    pub devices: Option<Vec<String>>,
}

impl PluginResponse {
    /// Convert the payload into a device set
    pub fn into_device_set(self) -> GpuDeviceSet {
        GpuDeviceSet {
            devices: self.devices.unwrap_or_default(),
            volumes: self.volumes.unwrap_or_default(),
            volume_driver: self.volume_driver.filter(|d| !d.is_empty()),
        }
    }
}

/// GPU runtime backed by the nvidia-docker plugin
pub struct PluginRuntime {
    /// HTTP client for plugin queries
    client: reqwest::Client,
    /// Plugin base URL (e.g. `http://localhost:3476`)
    base_url: String,
    /// GPU indices to request; `None` requests every GPU
    gpus: Option<Vec<u32>>,
}

impl PluginRuntime {
    /// Create a plugin runtime for `host` (`host:port` or a full URL)
    pub fn new(host: &str, timeout_secs: u64, gpus: Option<Vec<u32>>) -> ComposeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ComposeError::RuntimeQuery(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url(host),
            gpus,
        })
    }

    /// Full URL of the device query endpoint
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CLI_JSON_PATH)
    }

    /// Value of the `dev` query parameter, if GPUs are narrowed
    fn dev_param(&self) -> Option<String> {
        self.gpus.as_ref().map(|indices| {
            indices
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

#[async_trait]
impl GpuRuntime for PluginRuntime {
    async fn query(&self) -> ComposeResult<GpuDeviceSet> {
        let url = self.endpoint();
        debug!(endpoint = %url, gpus = ?self.gpus, "Querying nvidia-docker plugin");

        let mut request = self.client.get(&url);
        if let Some(dev) = self.dev_param() {
            request = request.query(&[("dev", dev)]);
        }

        let response = request.send().await.map_err(|e| {
            warn!(endpoint = %url, error = %e, "nvidia-docker plugin unreachable");
            ComposeError::RuntimeQuery(format!("nvidia-docker plugin at {} unreachable: {}", url, e))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ComposeError::RuntimeQuery(format!("Failed to read plugin response: {}", e))
        })?;

        if !status.is_success() {
            return Err(ComposeError::RuntimeQuery(format!(
                "nvidia-docker plugin returned {}: {}",
                status,
                body.trim()
            )));
        }

        let payload: PluginResponse = serde_json::from_str(&body).map_err(|e| {
            ComposeError::RuntimeQuery(format!("Malformed plugin response: {}", e))
        })?;
        if payload.devices.is_none() {
            return Err(ComposeError::RuntimeQuery(
                "Malformed plugin response: missing Devices".to_string(),
            ));
        }

        let mut set = payload.into_device_set();
        if let Some(indices) = &self.gpus {
            set = set.select(indices);
        }

        info!(
            devices = set.devices.len(),
            volumes = set.volumes.len(),
            "Received GPU devices from nvidia-docker plugin"
        );

        Ok(set)
    }

    fn name(&self) -> &'static str {
        "plugin"
    }
}

/// Normalize a plugin address into a base URL without trailing slash
pub fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
