//! Solver invocation
//!
//! The solver is a black box: `<install>/<binary> <ini>`. Its exit status
//! is reported but never trusted as the success signal; the coordinator
//! looks for output files instead.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{RunError, RunResult};
use crate::variant::Variant;

/// One solver invocation
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Variant being run
    pub variant: Variant,
    /// Solver executable
    pub program: PathBuf,
    /// Configuration file passed as the only argument
    pub ini_path: PathBuf,
    /// Output root written into the configuration
    pub solver_root: PathBuf,
    /// Limit after which the solver is killed
    pub timeout: Option<Duration>,
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStatus {
    /// Process exited; `None` when killed by a signal
    Exited(Option<i32>),
    /// Process was killed after the timeout
    TimedOut,
}

/// Runs one solver invocation
///
/// Implement this trait to replace the external process, e.g. in tests.
#[async_trait::async_trait]
pub trait SolverLauncher: Send + Sync {
    /// Run the solver to completion
    ///
    /// # Errors
    /// Returns `RunError::Spawn` if the solver cannot be started at all
    async fn launch(&self, request: &LaunchRequest) -> RunResult<LaunchStatus>;
}

/// Launches the solver as a child process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait::async_trait]
impl SolverLauncher for ProcessLauncher {
    async fn launch(&self, request: &LaunchRequest) -> RunResult<LaunchStatus> {
        tracing::info!(
            "Running {} {} ({})",
            request.program.display(),
            request.ini_path.display(),
            request.variant
        );

        let mut child = Command::new(&request.program)
            .arg(&request.ini_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: request.program.clone(),
                source,
            })?;

        let status = match request.timeout {
            None => child.wait().await,
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status,
                    Err(_) => {
                        tracing::warn!(
                            "{} exceeded {:?}, killing it",
                            request.variant,
                            limit
                        );
                        if let Err(e) = child.kill().await {
                            tracing::warn!("Cannot kill {}: {}", request.program.display(), e);
                        }
                        return Ok(LaunchStatus::TimedOut);
                    }
                }
            }
        }
        .map_err(|e| RunError::io_error(&request.program, e))?;

        tracing::debug!("{} exited with {:?}", request.variant, status.code());
        Ok(LaunchStatus::Exited(status.code()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::variant::SolverVersion;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("solver.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn request(program: PathBuf, timeout: Option<Duration>) -> LaunchRequest {
        LaunchRequest {
            variant: Variant::Primary(SolverVersion::V1),
            ini_path: program.with_file_name("v1.ini"),
            solver_root: program.with_file_name("out_"),
            program,
            timeout,
        }
    }

    #[tokio::test]
    async fn reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exit 3");

        let status = ProcessLauncher.launch(&request(program, None)).await.unwrap();
        assert_eq!(status, LaunchStatus::Exited(Some(3)));
    }

    #[tokio::test]
    async fn kills_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "sleep 5");

        let status = ProcessLauncher
            .launch(&request(program, Some(Duration::from_millis(100))))
            .await
            .unwrap();
        assert_eq!(status, LaunchStatus::TimedOut);
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessLauncher
            .launch(&request(dir.path().join("class"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
        assert!(!err.is_recoverable());
    }
}
