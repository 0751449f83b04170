//! SystemCommandRunner: process execution for the release pipeline
//!
//! # Security Features
//!
//! - **Allow-list validation**: Only pre-approved programs can execute
//! - **Injection prevention**: Uses `tokio::process::Command`, arguments are never
//!   interpolated into a shell string
//! - **Graceful cancellation**: A cancelled program receives an interrupt signal
//!   and is waited for until it exits on its own
//!
//! # Example
//!
//! ```rust,no_run
//! use release_publisher::core::{CancelSignal, CommandRunner};
//! use release_publisher::security::SystemCommandRunner;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let runner = SystemCommandRunner::new();
//! let cancel = CancelSignal::never();
//! let head = runner
//!     .output(&cancel, Path::new("."), "git", &["rev-parse", "HEAD"])
//!     .await?;
//! println!("{}", head);
//! # Ok(())
//! # }
//! ```

use crate::core::cancel::CancelSignal;
use crate::core::error::CommandError;
use crate::core::traits::CommandRunner;
use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Programs the pipeline drives.
///
/// Only these commands can be executed via SystemCommandRunner.
const ALLOWED_COMMANDS: &[&str] = &["git", "gh"];

/// Command runner backed by real processes
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    allowed: Vec<String>,
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCommandRunner {
    /// Create a runner allowing `git` and `gh`
    pub fn new() -> Self {
        Self::with_allowed(ALLOWED_COMMANDS.iter().copied())
    }

    /// Create a runner with a custom allow-list
    pub fn with_allowed<I, S>(programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: programs.into_iter().map(Into::into).collect(),
        }
    }

    fn command(&self, dir: &Path, program: &str, args: &[&str]) -> Result<Command, CommandError> {
        if !self.allowed.iter().any(|allowed| allowed == program) {
            return Err(CommandError::NotAllowed(program.to_string()));
        }

        info!(command = program, ?args, dir = %dir.display(), "executing command");
        let mut command = Command::new(program);
        command.args(args).current_dir(dir).stdin(Stdio::null());
        Ok(command)
    }

    /// Start `command` unless cancellation has already been requested
    fn spawn(
        command: &mut Command,
        cancel: &CancelSignal,
        program: &str,
    ) -> Result<Child, CommandError> {
        if cancel.is_cancelled() {
            warn!(command = program, "cancellation requested, not starting command");
            return Err(CommandError::Cancelled {
                program: program.to_string(),
            });
        }
        command.spawn().map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })
    }

    /// Wait for `child`, interrupting it when `cancel` fires
    ///
    /// After the interrupt the child is given unbounded time to exit.
    async fn supervise(
        child: &mut Child,
        cancel: &CancelSignal,
        program: &str,
    ) -> Result<ExitStatus, CommandError> {
        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        match finished {
            Some(status) => status.map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            }),
            None => {
                warn!(command = program, "cancellation requested, interrupting command");
                interrupt(child);
                if let Err(e) = child.wait().await {
                    warn!(command = program, error = %e, "failed to wait for interrupted command");
                }
                Err(CommandError::Cancelled {
                    program: program.to_string(),
                })
            }
        }
    }

    fn check_status(status: ExitStatus, program: &str, args: &[&str]) -> Result<(), CommandError> {
        if status.success() {
            return Ok(());
        }
        Err(CommandError::Failed {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            code: status.code(),
        })
    }
}

/// Deliver an interrupt (not a kill) to the child
#[cfg(unix)]
fn interrupt(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: kill(2) with a pid we own and a valid signal number has no
        // memory-safety preconditions.
        let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
        if result != 0 {
            warn!(pid, "failed to deliver SIGINT");
        }
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to stop command");
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        cancel: &CancelSignal,
        dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<(), CommandError> {
        let mut command = self.command(dir, program, args)?;
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());

        let mut child = Self::spawn(&mut command, cancel, program)?;
        let status = Self::supervise(&mut child, cancel, program).await?;
        Self::check_status(status, program, args)
    }

    async fn output(
        &self,
        cancel: &CancelSignal,
        dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<String, CommandError> {
        let mut command = self.command(dir, program, args)?;
        command.stdout(Stdio::piped()).stderr(Stdio::inherit());

        let mut child = Self::spawn(&mut command, cancel, program)?;
        let mut stdout = child.stdout.take();
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(stdout) = stdout.as_mut() {
                stdout.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        });

        let status = Self::supervise(&mut child, cancel, program).await?;
        Self::check_status(status, program, args)?;

        let buf = reader
            .await
            .map_err(|e| CommandError::Spawn {
                program: program.to_string(),
                source: std::io::Error::other(e),
            })?
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(String::from_utf8_lossy(&buf).trim().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn runner() -> SystemCommandRunner {
        SystemCommandRunner::with_allowed(["sh", "sleep", "definitely-not-a-real-binary"])
    }

    fn test_dir() -> std::path::PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn test_default_allow_list() {
        let runner = SystemCommandRunner::new();
        assert_eq!(runner.allowed, vec!["git", "gh"]);
    }

    #[tokio::test]
    async fn test_rejected_command() {
        let result = SystemCommandRunner::new()
            .run(&CancelSignal::never(), &test_dir(), "rm", &["-rf", "/"])
            .await;

        assert!(matches!(result, Err(CommandError::NotAllowed(_))));
    }

    #[tokio::test]
    async fn test_output_is_trimmed() {
        let output = runner()
            .output(&CancelSignal::never(), &test_dir(), "sh", &["-c", "echo '  12345  '"])
            .await
            .unwrap();

        assert_eq!(output, "12345");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let result = runner()
            .run(&CancelSignal::never(), &test_dir(), "sh", &["-c", "exit 3"])
            .await;

        match result {
            Err(CommandError::Failed { program, code, .. }) => {
                assert_eq!(program, "sh");
                assert_eq!(code, Some(3));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let result = runner()
            .run(
                &CancelSignal::never(),
                &test_dir(),
                "definitely-not-a-real-binary",
                &[],
            )
            .await;

        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("marker"), "x").unwrap();

        let output = runner()
            .output(&CancelSignal::never(), temp_dir.path(), "sh", &["-c", "ls"])
            .await
            .unwrap();

        assert_eq!(output, "marker");
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_command() {
        let (handle, cancel) = CancelSignal::new();
        let start = Instant::now();

        let task = tokio::spawn(async move {
            runner()
                .run(&cancel, &test_dir(), "sleep", &["30"])
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CommandError::Cancelled { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_no_command_starts_after_cancellation() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let marker = temp_dir.path().join("marker");
        let (handle, cancel) = CancelSignal::new();
        handle.cancel();

        let result = runner()
            .run(&cancel, temp_dir.path(), "sh", &["-c", "trap '' INT; touch marker"])
            .await;
        assert!(matches!(result, Err(CommandError::Cancelled { .. })));

        let result = runner()
            .output(&cancel, temp_dir.path(), "sh", &["-c", "trap '' INT; touch marker; echo ran"])
            .await;
        assert!(matches!(result, Err(CommandError::Cancelled { .. })));

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_interrupted_command_may_clean_up() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let marker = temp_dir.path().join("cleaned");
        let script = format!(
            "trap 'touch {}; exit 0' INT; sleep 30 & wait",
            marker.display()
        );
        let (handle, cancel) = CancelSignal::new();

        let dir = temp_dir.path().to_path_buf();
        let task = tokio::spawn(async move { runner().run(&cancel, &dir, "sh", &["-c", script.as_str()]).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CommandError::Cancelled { .. })));
        assert!(marker.exists());
    }
}
