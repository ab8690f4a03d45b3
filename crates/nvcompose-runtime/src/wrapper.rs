//! The invocation pipeline: load, query, merge, write, delegate

use nvcompose_core::{
    merge, parse_gpu_selection, ComposeFile, ComposeResult, ComposeTemplate, GpuDeviceSet,
    MergeSummary, RuntimeBackend, WrapperConfig,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::container_cli::ContainerCliRuntime;
use crate::plugin::PluginRuntime;
use crate::process::{ProcessExecutor, ProcessExecutorConfig};
use crate::traits::{Executor, GpuRuntime};

/// What a single invocation should do
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Base compose file
    pub file: PathBuf,
    /// Render `file` as a template with the GPU device set before parsing
    pub template: bool,
    /// Persistent output path; a transient file is used when `None`
    pub output: Option<PathBuf>,
    /// Write the merged file but do not run compose
    pub generate_only: bool,
    /// Arguments forwarded verbatim to compose
    pub args: Vec<String>,
}

/// Result of a completed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Only generated; `path` is `None` when nothing was written to disk
    Generated {
        path: Option<PathBuf>,
        yaml: String,
        summary: MergeSummary,
    },
    /// Compose ran and exited with this code
    Completed(i32),
}

impl Outcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Generated { .. } => 0,
            Outcome::Completed(code) => *code,
        }
    }
}

/// Ties a GPU runtime and an executor together
pub struct Wrapper {
    runtime: Box<dyn GpuRuntime>,
    executor: Box<dyn Executor>,
}

impl Wrapper {
    /// Create a wrapper from explicit parts
    pub fn new(runtime: Box<dyn GpuRuntime>, executor: Box<dyn Executor>) -> Self {
        Self { runtime, executor }
    }

    /// Create a wrapper with the backends named in `config`
    pub fn from_config(config: &WrapperConfig) -> ComposeResult<Self> {
        let gpus = match &config.runtime.gpus {
            Some(selection) => parse_gpu_selection(selection)?,
            None => None,
        };

        let runtime: Box<dyn GpuRuntime> = match config.runtime.backend {
            RuntimeBackend::Plugin => Box::new(PluginRuntime::new(
                &config.runtime.host,
                config.runtime.timeout_secs,
                gpus,
            )?),
            RuntimeBackend::ContainerCli => Box::new(ContainerCliRuntime::new(
                config.runtime.container_cli_path.clone(),
                gpus,
            )),
        };

        let executor = Box::new(ProcessExecutor::new(ProcessExecutorConfig {
            binary: config.compose.binary.clone(),
            prefix_args: config.compose.prefix_args.clone(),
        }));

        debug!(
            runtime = runtime.name(),
            executor = executor.name(),
            "Wrapper configured"
        );

        Ok(Self::new(runtime, executor))
    }

    /// Run one invocation
    ///
    /// The base file is parsed before the GPU runtime is queried, and
    /// the runtime is queried before anything is spawned. A template is
    /// checked for syntax first, then rendered with the queried devices
    /// and parsed. A transient merged file lives next to the base file so
    /// relative paths in it resolve the same way; it is removed when this
    /// returns.
    pub async fn run(&self, invocation: &Invocation) -> ComposeResult<Outcome> {
        let (compose, gpus) = if invocation.template {
            let template = ComposeTemplate::from_path(&invocation.file)?;
            let gpus = self.query().await?;
            let rendered = template.render(&gpus)?;
            (ComposeFile::parse(&rendered, template.path())?, gpus)
        } else {
            let compose = ComposeFile::from_path(&invocation.file)?;
            (compose, self.query().await?)
        };

        let (compose, summary) = merge(&compose, &gpus);
        debug!(
            layout = ?compose.layout(),
            version = ?compose.version(),
            declared = ?summary.volumes_declared,
            "Merged compose file"
        );
        let yaml = compose.to_yaml()?;

        if let Some(output) = &invocation.output {
            tokio::fs::write(output, &yaml).await?;
            info!(path = %output.display(), "Wrote merged compose file");

            if invocation.generate_only {
                return Ok(Outcome::Generated {
                    path: Some(output.clone()),
                    yaml,
                    summary,
                });
            }
            let code = self.executor.execute(output, &invocation.args).await?;
            return Ok(Outcome::Completed(code));
        }

        if invocation.generate_only {
            return Ok(Outcome::Generated {
                path: None,
                yaml,
                summary,
            });
        }

        let transient = write_transient(&invocation.file, &yaml)?;
        debug!(path = %transient.path().display(), "Wrote transient compose file");

        let code = self
            .executor
            .execute(transient.path(), &invocation.args)
            .await?;
        Ok(Outcome::Completed(code))
    }

    async fn query(&self) -> ComposeResult<GpuDeviceSet> {
        let gpus = self.runtime.query().await?;
        debug!(
            runtime = self.runtime.name(),
            gpus = ?gpus.gpu_devices().collect::<Vec<_>>(),
            support_devices = ?gpus.support_devices().collect::<Vec<_>>(),
            volumes = ?gpus.volumes,
            "GPU runtime queried"
        );
        Ok(gpus)
    }
}

/// Write `yaml` to a temporary file beside `base`
fn write_transient(base: &Path, yaml: &str) -> ComposeResult<tempfile::NamedTempFile> {
    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut file = tempfile::Builder::new()
        .prefix(".nvidia-docker-compose-")
        .suffix(".yml")
        .tempfile_in(&dir)?;
    file.write_all(yaml.as_bytes())?;
    file.flush()?;
    Ok(file)
}
