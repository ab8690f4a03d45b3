//! GPU device sets reported by the host GPU runtime

use serde::{Deserialize, Serialize};

/// Prefix shared by every NVIDIA device node
const NVIDIA_DEVICE_PREFIX: &str = "/dev/nvidia";

/// Devices and driver volumes that must be exposed to every container
///
/// Obtained once from the GPU runtime at process start and passed
/// explicitly into the merge. An empty device list means "no GPUs",
/// which turns the merge into a pass-through copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDeviceSet {
    /// Device paths (e.g. `/dev/nvidia0`, `/dev/nvidiactl`)
    pub devices: Vec<String>,
    /// Driver volume specs (e.g. `nvidia_driver_375.26:/usr/local/nvidia:ro`)
    pub volumes: Vec<String>,
    /// Volume driver serving the named driver volumes, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_driver: Option<String>,
}

impl GpuDeviceSet {
    /// Create a device set from explicit device and volume lists
    pub fn new(devices: Vec<String>, volumes: Vec<String>) -> Self {
        Self {
            devices,
            volumes,
            volume_driver: None,
        }
    }

    /// Create an empty device set (no GPUs available)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the runtime reported no devices at all
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Per-GPU device nodes (`/dev/nvidiaN`)
    pub fn gpu_devices(&self) -> impl Iterator<Item = &str> {
        self.devices
            .iter()
            .map(String::as_str)
            .filter(|d| gpu_index(d).is_some())
    }

    /// Control and support devices shared by all GPUs
    pub fn support_devices(&self) -> impl Iterator<Item = &str> {
        self.devices
            .iter()
            .map(String::as_str)
            .filter(|d| gpu_index(d).is_none())
    }

    /// Narrow the set to the given GPU indices
    ///
    /// Support devices and volumes are kept as-is. Indices with no
    /// matching device node are ignored.
    pub fn select(&self, indices: &[u32]) -> Self {
        let devices = self
            .devices
            .iter()
            .filter(|d| match gpu_index(d) {
                Some(index) => indices.contains(&index),
                None => true,
            })
            .cloned()
            .collect();

        Self {
            devices,
            volumes: self.volumes.clone(),
            volume_driver: self.volume_driver.clone(),
        }
    }

    /// Names of the named (non-path) volumes among the driver volumes
    pub fn named_volumes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for volume in &self.volumes {
            if let Some(name) = named_volume_source(volume) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// GPU index of a per-GPU device node, `None` for anything else
pub fn gpu_index(device: &str) -> Option<u32> {
    let host = device.split(':').next().unwrap_or(device);
    let suffix = host.strip_prefix(NVIDIA_DEVICE_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Source of a short-syntax volume spec when it names a volume
///
/// `nvidia_driver_375.26:/usr/local/nvidia:ro` yields
/// `nvidia_driver_375.26`; bind mounts (`/usr/lib:/usr/lib`,
/// `./data:/data`, `~/x:/x`) yield `None`.
pub fn named_volume_source(spec: &str) -> Option<&str> {
    let (source, _) = spec.split_once(':')?;
    if source.is_empty()
        || source.starts_with('/')
        || source.starts_with('.')
        || source.starts_with('~')
    {
        return None;
    }
    Some(source)
}

/// Parse a GPU selection such as `0,1` or `0 1` into indices
///
/// `all` (or an empty string) selects every GPU and yields `None`.
pub fn parse_gpu_selection(selection: &str) -> Result<Option<Vec<u32>>, crate::ComposeError> {
    let trimmed = selection.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(None);
    }

    trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>().map_err(|_| {
                crate::ComposeError::Config(format!("Invalid GPU index '{}' in '{}'", part, selection))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
