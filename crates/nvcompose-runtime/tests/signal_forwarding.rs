//! Signal relay to the compose child
//!
//! Lives in its own test binary: the signal is raised on the whole test
//! process, which must not disturb children spawned by other tests.

#![cfg(unix)]

use nix::sys::signal::{raise, Signal};
use nvcompose_runtime::{Executor, ProcessExecutor, ProcessExecutorConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[tokio::test]
async fn test_sigterm_is_relayed_to_compose() {
    let executor = ProcessExecutor::new(ProcessExecutorConfig {
        binary: PathBuf::from("sh"),
        prefix_args: vec![
            "-c".to_string(),
            "trap 'exit 42' TERM; sleep 5 & wait".to_string(),
        ],
    });

    let run = tokio::spawn(async move {
        executor
            .execute(Path::new("docker-compose.yml"), &[])
            .await
    });

    // Let the child install its trap and the wrapper its signal handlers
    tokio::time::sleep(Duration::from_millis(500)).await;
    raise(Signal::SIGTERM).unwrap();

    let code = tokio::time::timeout(Duration::from_secs(4), run)
        .await
        .expect("compose child did not exit after SIGTERM")
        .unwrap()
        .unwrap();
    assert_eq!(code, 42);
}
