//! Configuration types for nvcompose

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the nvidia-docker plugin address
pub const NV_HOST_ENV: &str = "NV_HOST";
/// Environment variable selecting GPUs (e.g. `0,1`)
pub const NV_GPU_ENV: &str = "NV_GPU";
/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "NVCOMPOSE_CONFIG";

/// Wrapper configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    /// GPU runtime configuration
    pub runtime: RuntimeConfig,
    /// Delegated compose configuration
    pub compose: ComposeConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl WrapperConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, crate::ComposeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::ComposeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            crate::ComposeError::Config(format!(
                "Failed to parse config {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Resolve and load the effective configuration
    ///
    /// An explicit path must exist. Otherwise `NVCOMPOSE_CONFIG`, then
    /// `$XDG_CONFIG_HOME/nvcompose/config.toml` (or
    /// `~/.config/nvcompose/config.toml`) are tried, falling back to
    /// defaults. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, crate::ComposeError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover(|key| std::env::var(key).ok()) {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Candidate config path derived from the environment
    pub fn discover(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        if let Some(path) = env(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let base = env("XDG_CONFIG_HOME")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| env("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("nvcompose").join("config.toml"))
    }

    /// Apply `NV_HOST` / `NV_GPU` overrides
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(host) = env(NV_HOST_ENV).filter(|h| !h.is_empty()) {
            self.runtime.host = host;
        }
        if let Some(gpus) = env(NV_GPU_ENV) {
            self.runtime.gpus = Some(gpus);
        }
    }
}

/// GPU runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Which runtime to query
    pub backend: RuntimeBackend,
    /// nvidia-docker plugin address (`host:port` or full URL)
    pub host: String,
    /// Query timeout in seconds
    pub timeout_secs: u64,
    /// Path to the nvidia-container-cli binary
    pub container_cli_path: PathBuf,
    /// GPU selection (`0,1`, `all`); `None` selects every GPU
    pub gpus: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: RuntimeBackend::Plugin,
            host: "localhost:3476".to_string(),
            timeout_secs: 10,
            container_cli_path: PathBuf::from("nvidia-container-cli"),
            gpus: None,
        }
    }
}

/// GPU runtime backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeBackend {
    /// nvidia-docker plugin REST API
    Plugin,
    /// nvidia-container-cli
    ContainerCli,
}

impl std::fmt::Display for RuntimeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeBackend::Plugin => write!(f, "plugin"),
            RuntimeBackend::ContainerCli => write!(f, "container-cli"),
        }
    }
}

/// Delegated compose configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Compose binary to run
    pub binary: PathBuf,
    /// Arguments placed before `-f` (e.g. `["compose"]` for `docker compose`)
    pub prefix_args: Vec<String>,
    /// Base compose file used when `--file` is not given
    pub default_file: PathBuf,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker-compose"),
            prefix_args: Vec::new(),
            default_file: PathBuf::from("docker-compose.yml"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text or compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}
