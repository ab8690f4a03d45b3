//! Jinja-style compose templates
//!
//! A template is rendered with the queried GPU device set before it is
//! parsed as a compose file, so a single template can scale services to
//! the number of GPUs on the host:
//!
//! ```yaml
//! services:
//! {% for device in GPU_DEVICES %}
//!   worker{{ loop.index0 }}:
//!     image: cuda
//!     devices:
//!       - {{ device }}
//! {% endfor %}
//! ```
//!
//! Variables:
//! - `N_GPU`: number of per-GPU device nodes
//! - `GPU_DEVICES`: the per-GPU device nodes (`/dev/nvidiaN`)
//! - `SUPPORT_DEVICES`: control devices shared by all GPUs
//! - `DEVICES`: every device, in runtime order
//! - `VOLUMES`: driver volume specs
//! - `VOLUME_DRIVER`: the volume driver name, or none

use minijinja::{context, Environment, UndefinedBehavior};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{ComposeError, ComposeResult, GpuDeviceSet};

/// A compose template that has been checked for syntax errors
#[derive(Debug, Clone)]
pub struct ComposeTemplate {
    path: PathBuf,
    source: String,
}

impl ComposeTemplate {
    /// Read a template from disk
    pub fn from_path(path: &Path) -> ComposeResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ComposeError::malformed(path, format!("Failed to read compose template: {}", e))
        })?;
        Self::parse(source, path)
    }

    /// Compile `source` once so syntax errors surface before any GPU query
    pub fn parse(source: String, path: &Path) -> ComposeResult<Self> {
        environment()
            .template_from_str(&source)
            .map_err(|e| template_error(path, &e))?;

        Ok(Self {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Path the template was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the template into compose YAML
    pub fn render(&self, gpus: &GpuDeviceSet) -> ComposeResult<String> {
        let env = environment();
        let template = env
            .template_from_str(&self.source)
            .map_err(|e| template_error(&self.path, &e))?;

        let gpu_devices: Vec<&str> = gpus.gpu_devices().collect();
        let support_devices: Vec<&str> = gpus.support_devices().collect();

        debug!(
            path = %self.path.display(),
            gpus = gpu_devices.len(),
            "Rendering compose template"
        );

        template
            .render(context! {
                N_GPU => gpu_devices.len(),
                GPU_DEVICES => gpu_devices,
                SUPPORT_DEVICES => support_devices,
                DEVICES => &gpus.devices,
                VOLUMES => &gpus.volumes,
                VOLUME_DRIVER => &gpus.volume_driver,
            })
            .map_err(|e| template_error(&self.path, &e))
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    // A misspelled variable must not silently render as an empty string
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env
}

fn template_error(path: &Path, err: &minijinja::Error) -> ComposeError {
    ComposeError::malformed(path, format!("template error: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_gpus() -> GpuDeviceSet {
        GpuDeviceSet {
            devices: vec![
                "/dev/nvidiactl".to_string(),
                "/dev/nvidia-uvm".to_string(),
                "/dev/nvidia0".to_string(),
                "/dev/nvidia1".to_string(),
            ],
            volumes: vec!["nvidia_driver_375.26:/usr/local/nvidia:ro".to_string()],
            volume_driver: Some("nvidia-docker".to_string()),
        }
    }

    fn template(source: &str) -> ComposeResult<ComposeTemplate> {
        ComposeTemplate::parse(source.to_string(), Path::new("docker-compose.yml.jinja"))
    }

    #[test]
    fn test_render_gpu_variables() {
        let rendered = template("n={{ N_GPU }} gpus={{ GPU_DEVICES | join(',') }}\n")
            .unwrap()
            .render(&two_gpus())
            .unwrap();
        assert_eq!(rendered, "n=2 gpus=/dev/nvidia0,/dev/nvidia1\n");
    }

    #[test]
    fn test_render_support_devices_and_volumes() {
        let rendered = template(
            "{{ SUPPORT_DEVICES | join(' ') }}|{{ VOLUMES[0] }}|{{ VOLUME_DRIVER }}|{{ DEVICES | length }}",
        )
        .unwrap()
        .render(&two_gpus())
        .unwrap();
        assert_eq!(
            rendered,
            "/dev/nvidiactl /dev/nvidia-uvm|nvidia_driver_375.26:/usr/local/nvidia:ro|nvidia-docker|4"
        );
    }

    #[test]
    fn test_render_one_service_per_gpu() {
        let source = r#"version: "2"
services:
{% for device in GPU_DEVICES %}
  worker{{ loop.index0 }}:
    image: cuda
    devices:
      - {{ device }}
{% endfor %}
"#;
        let rendered = template(source).unwrap().render(&two_gpus()).unwrap();
        let compose = crate::ComposeFile::parse(&rendered, Path::new("rendered.yml")).unwrap();

        let names: Vec<_> = compose.services().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["worker0", "worker1"]);
        assert_eq!(
            compose.service("worker1").unwrap().devices,
            Some(vec!["/dev/nvidia1".to_string()])
        );
    }

    #[test]
    fn test_render_without_gpus() {
        let rendered = template("count: {{ N_GPU }}\n")
            .unwrap()
            .render(&GpuDeviceSet::empty())
            .unwrap();
        assert_eq!(rendered, "count: 0\n");
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = template("services:\n{% for x in GPU_DEVICES %}\n").unwrap_err();
        assert!(matches!(err, ComposeError::ConfigParse { .. }));
        assert!(err.to_string().contains("template error"));
    }

    #[test]
    fn test_undefined_variable_is_parse_error() {
        let err = template("{{ N_GPUS }}")
            .unwrap()
            .render(&two_gpus())
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::EXIT_CONFIG_PARSE);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml.jinja");
        std::fs::write(&path, "app:\n  image: nginx\n").unwrap();
        let template = ComposeTemplate::from_path(&path).unwrap();
        assert_eq!(template.path(), path.as_path());

        let missing = ComposeTemplate::from_path(&dir.path().join("missing.jinja")).unwrap_err();
        assert!(matches!(missing, ComposeError::ConfigParse { .. }));
    }
}
