//! Process-based compose executor
//!
//! Runs the wrapped compose binary as a child process with the parent's
//! stdio and environment, waits for it, and reports its exit code.

use async_trait::async_trait;
use nvcompose_core::{ComposeError, ComposeResult};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{debug, error, info};

use crate::traits::Executor;

/// Process executor configuration
#[derive(Debug, Clone)]
pub struct ProcessExecutorConfig {
    /// Path to the compose binary
    pub binary: PathBuf,
    /// Arguments placed before `-f` (e.g. `compose` for `docker compose`)
    pub prefix_args: Vec<String>,
}

impl Default for ProcessExecutorConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker-compose"),
            prefix_args: Vec::new(),
        }
    }
}

/// Executor that spawns the compose binary
pub struct ProcessExecutor {
    config: ProcessExecutorConfig,
}

impl ProcessExecutor {
    /// Create a new process executor
    pub fn new(config: ProcessExecutorConfig) -> Self {
        Self { config }
    }

    /// Argument vector passed to the compose binary
    pub fn command_args(&self, compose_file: &Path, args: &[String]) -> Vec<String> {
        let mut argv = self.config.prefix_args.clone();
        argv.push("-f".to_string());
        argv.push(compose_file.display().to_string());
        argv.extend(args.iter().cloned());
        argv
    }

    /// Build the command to run compose
    fn build_command(&self, compose_file: &Path, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(self.command_args(compose_file, args));

        // Output is passed through untouched
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        cmd
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, compose_file: &Path, args: &[String]) -> ComposeResult<i32> {
        info!(
            binary = %self.config.binary.display(),
            compose_file = %compose_file.display(),
            args = ?args,
            "Starting compose"
        );

        let mut cmd = self.build_command(compose_file, args);

        let mut child = cmd.spawn().map_err(|e| {
            error!(
                binary = %self.config.binary.display(),
                error = %e,
                "Failed to spawn compose process"
            );
            ComposeError::Execution(format!(
                "Failed to spawn {}: {}",
                self.config.binary.display(),
                e
            ))
        })?;

        debug!(pid = child.id().unwrap_or(0), "Compose process spawned");

        let status = wait_forwarding_signals(&mut child).await?;
        let code = exit_code(status);

        debug!(status = %status, code = code, "Compose process exited");

        Ok(code)
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// Wait for the child, relaying SIGTERM and SIGHUP to it
///
/// SIGINT is caught but not relayed: a terminal delivers it to the whole
/// foreground process group, so the child already has it. Catching it
/// keeps the wrapper alive until the child has shut down.
#[cfg(unix)]
async fn wait_forwarding_signals(child: &mut Child) -> ComposeResult<ExitStatus> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let pid = child.id().map(|id| Pid::from_raw(id as i32));
    let forward = |sig: Signal| {
        if let Some(pid) = pid {
            info!(signal = %sig, pid = %pid, "Forwarding signal to compose");
            if let Err(e) = kill(pid, sig) {
                debug!(signal = %sig, error = %e, "Failed to forward signal");
            }
        }
    };

    loop {
        tokio::select! {
            status = child.wait() => return Ok(status?),
            _ = sigint.recv() => debug!("Received SIGINT, waiting for compose to exit"),
            _ = sigterm.recv() => forward(Signal::SIGTERM),
            _ = sighup.recv() => forward(Signal::SIGHUP),
        }
    }
}

#[cfg(not(unix))]
async fn wait_forwarding_signals(child: &mut Child) -> ComposeResult<ExitStatus> {
    Ok(child.wait().await?)
}

/// Map a child exit status onto the wrapper's exit code
///
/// A child killed by signal N reports `128 + N`, like a shell.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }

    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_executor_config_default() {
        let config = ProcessExecutorConfig::default();
        assert_eq!(config.binary.to_str().unwrap(), "docker-compose");
        assert!(config.prefix_args.is_empty());
    }

    #[test]
    fn test_command_args() {
        let executor = ProcessExecutor::new(ProcessExecutorConfig {
            binary: PathBuf::from("docker"),
            prefix_args: vec!["compose".to_string()],
        });

        let args = vec!["up".to_string(), "-d".to_string()];
        let argv = executor.command_args(Path::new("/tmp/merged.yml"), &args);
        assert_eq!(argv, vec!["compose", "-f", "/tmp/merged.yml", "up", "-d"]);
        assert_eq!(executor.name(), "process");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_returns_child_exit_code() {
        let executor = ProcessExecutor::new(ProcessExecutorConfig {
            binary: PathBuf::from("sh"),
            prefix_args: vec!["-c".to_string(), "exit 7".to_string()],
        });

        let code = executor
            .execute(Path::new("ignored.yml"), &[])
            .await
            .unwrap();
        assert_eq!(code, 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_success() {
        let executor = ProcessExecutor::new(ProcessExecutorConfig {
            binary: PathBuf::from("true"),
            prefix_args: Vec::new(),
        });

        let code = executor
            .execute(Path::new("docker-compose.yml"), &["up".to_string()])
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_execute_missing_binary() {
        let executor = ProcessExecutor::new(ProcessExecutorConfig {
            binary: PathBuf::from("/nonexistent/docker-compose"),
            prefix_args: Vec::new(),
        });

        let err = executor
            .execute(Path::new("docker-compose.yml"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::Execution(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_from_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }
}
