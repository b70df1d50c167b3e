//! External command execution

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::SystemError;
use crate::{NetworkError, Result};

/// Default bound on a single external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code of the command, `None` when killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Render a command line for logs and error messages
pub fn format_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Process execution seam. Probes and activation go through this so tests
/// can script command results.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Timeout applied by [`CommandRunner::run`]
    fn default_timeout(&self) -> Duration;

    /// Run a command with an explicit timeout. A non-zero exit is returned as
    /// output, not as an error.
    async fn run_with_timeout(
        &self,
        cancel: &CancellationToken,
        limit: Duration,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput>;

    async fn run(
        &self,
        cancel: &CancellationToken,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        self.run_with_timeout(cancel, self.default_timeout(), program, args)
            .await
    }

    /// Run a side-effecting command whose output is of no interest; a
    /// non-zero exit becomes [`SystemError::CommandFailed`] with stderr.
    async fn run_quiet(
        &self,
        cancel: &CancellationToken,
        program: &str,
        args: &[&str],
    ) -> Result<()> {
        let output = self.run(cancel, program, args).await?;
        if !output.success() {
            return Err(NetworkError::System(SystemError::CommandFailed {
                command: format_command(program, args),
                stderr: output.stderr.trim().to_string(),
            }));
        }
        Ok(())
    }
}

/// Runs commands as child processes of the agent
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    default_timeout: Duration,
}

impl ProcessRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn run_with_timeout(
        &self,
        cancel: &CancellationToken,
        limit: Duration,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        let command_line = format_command(program, args);
        if cancel.is_cancelled() {
            return Err(NetworkError::System(SystemError::Cancelled {
                operation: command_line,
            }));
        }

        let start_time = Instant::now();
        debug!("Executing {}", command_line);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Dropping the output future kills the child on cancel or timeout.
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("{} cancelled", command_line);
                return Err(NetworkError::System(SystemError::Cancelled {
                    operation: command_line,
                }));
            }
            result = timeout(limit, cmd.output()) => result,
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                let output = CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    duration_ms,
                };

                if output.success() {
                    debug!("{} completed in {}ms", command_line, duration_ms);
                } else {
                    warn!(
                        "{} exited with code {:?}: {}",
                        command_line,
                        output.exit_code,
                        output.stderr.trim()
                    );
                }

                Ok(output)
            }
            Ok(Err(e)) => {
                error!("{} failed to execute: {}", command_line, e);
                Err(NetworkError::System(SystemError::CommandSpawn {
                    command: command_line,
                    message: e.to_string(),
                }))
            }
            Err(_) => {
                error!("{} timed out after {:?}", command_line, limit);
                Err(NetworkError::System(SystemError::CommandTimeout {
                    command: command_line,
                    timeout: limit,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = ProcessRunner::default();
        let cancel = CancellationToken::new();

        let output = runner
            .run(&cancel, "sh", &["-c", "echo out; echo err >&2; exit 3"])
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_run_quiet_carries_stderr() {
        let runner = ProcessRunner::default();
        let cancel = CancellationToken::new();

        runner.run_quiet(&cancel, "true", &[]).await.unwrap();

        let err = runner
            .run_quiet(&cancel, "sh", &["-c", "echo broken >&2; exit 1"])
            .await
            .unwrap_err();
        match err {
            NetworkError::System(SystemError::CommandFailed { stderr, .. }) => {
                assert_eq!(stderr, "broken")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let runner = ProcessRunner::default();
        let cancel = CancellationToken::new();

        let err = runner
            .run_with_timeout(&cancel, Duration::from_millis(100), "sleep", &["5"])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NetworkError::System(SystemError::CommandTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_command() {
        let runner = ProcessRunner::default();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = runner.run(&cancel, "sleep", &["5"]).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));

        // Already-cancelled tokens never spawn anything
        let err = runner.run(&cancel, "true", &[]).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let runner = ProcessRunner::default();
        let cancel = CancellationToken::new();

        let err = runner
            .run(&cancel, "/nonexistent/guest-netctl-missing", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NetworkError::System(SystemError::CommandSpawn { .. })
        ));
    }

    #[test]
    fn test_format_command() {
        assert_eq!(
            format_command("networkctl", &["status", "eth0", "--json=short"]),
            "networkctl status eth0 --json=short"
        );
    }
}
