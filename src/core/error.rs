//! Error handling for the release pipeline
//!
//! This module provides the error taxonomy of the pipeline (configuration,
//! external command, metadata lookup, cancellation) using the thiserror crate,
//! together with error codes and recovery guidance for the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by a [`CommandRunner`](crate::core::traits::CommandRunner)
#[derive(Error, Debug)]
pub enum CommandError {
    /// Program is not in the runner's allow-list
    #[error("command '{0}' is not in the allowed list")]
    NotAllowed(String),

    /// Program could not be started (binary not found, permission denied, bad working directory)
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program ran and exited unsuccessfully
    #[error("'{program} {}' exited with {}", args.join(" "), describe_code(*code))]
    Failed {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
    },

    /// The ambient cancellation fired while the program was running
    #[error("'{program}' was interrupted by cancellation")]
    Cancelled { program: String },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

impl CommandError {
    /// Check if this error was caused by cancellation rather than the tool itself
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Main error type for release pipeline operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    // External command errors
    #[error("{intent}: {source}")]
    Command {
        intent: String,
        #[source]
        source: CommandError,
    },

    // Metadata lookup errors
    #[error("get the default branch of {owner}/{name}: {source}")]
    Metadata {
        owner: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    // Cancellation
    #[error("{intent}: cancelled")]
    Cancelled { intent: String },

    // Workflow run errors
    #[error("no run of workflow {workflow} was found")]
    WorkflowRunNotFound { workflow: String },

    #[error("workflow {workflow} run lookup returned an ambiguous result: {output:?}")]
    AmbiguousWorkflowRun { workflow: String, output: String },

    #[error("workflow run {run_id} did not succeed: {source}")]
    WorkflowRunFailed {
        run_id: String,
        #[source]
        source: CommandError,
    },

    // Filesystem errors
    #[error("{intent} ({}): {source}", path.display())]
    Filesystem {
        intent: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Publishing errors
    #[error("process {kind} ({target}): {source}")]
    Publish {
        kind: String,
        target: String,
        #[source]
        source: Box<ReleaseError>,
    },
}

impl ReleaseError {
    /// Build a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wrap a command failure with the operation's intent
    ///
    /// A cancelled command becomes [`ReleaseError::Cancelled`] so callers can
    /// tell an interrupted pipeline from a failing tool.
    pub fn command(intent: impl Into<String>, source: CommandError) -> Self {
        let intent = intent.into();
        if source.is_cancellation() {
            Self::Cancelled { intent }
        } else {
            Self::Command { intent, source }
        }
    }

    /// Wrap a filesystem failure with the operation's intent
    pub fn filesystem(
        intent: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Filesystem {
            intent: intent.into(),
            path: path.into(),
            source,
        }
    }

    /// Check if this error (or the publisher error it wraps) is a cancellation
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::WorkflowRunFailed { source, .. } => source.is_cancellation(),
            Self::Publish { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Command { .. } => "COMMAND_ERROR",
            Self::Metadata { .. } => "METADATA_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::WorkflowRunNotFound { .. } => "WORKFLOW_RUN_NOT_FOUND",
            Self::AmbiguousWorkflowRun { .. } => "AMBIGUOUS_WORKFLOW_RUN",
            Self::WorkflowRunFailed { .. } => "WORKFLOW_RUN_FAILED",
            Self::Filesystem { .. } => "FILESYSTEM_ERROR",
            Self::Publish { source, .. } => source.code(),
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Config { .. } => vec![
                "Check .goreleaser.yaml (or the file passed with --config)",
                "Pass the version to release as the first argument",
            ],
            Self::Command { .. } => vec![
                "Check the command output above",
                "Make sure git and gh are installed and authenticated",
            ],
            Self::Metadata { .. } => vec![
                "Set GITHUB_TOKEN or GH_TOKEN",
                "Set an explicit branch for the target in the configuration",
            ],
            Self::Cancelled { .. } => vec!["Re-run with --run-id to resume without re-tagging"],
            Self::WorkflowRunNotFound { .. } | Self::AmbiguousWorkflowRun { .. } => vec![
                "Check that the tag push triggers the workflow",
                "Pass the run ID explicitly with --run-id",
            ],
            Self::WorkflowRunFailed { .. } => vec![
                "Inspect the failed run with `gh run view --log-failed`",
                "Re-run with --run-id once a successful run exists",
            ],
            Self::Filesystem { .. } => vec!["Check free space and permissions of the temporary directory"],
            Self::Publish { source, .. } => source.suggested_actions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let error = CommandError::Failed {
            program: "git".to_string(),
            args: vec!["push".to_string(), "origin".to_string(), "v1.0.0".to_string()],
            code: Some(128),
        };

        assert_eq!(
            error.to_string(),
            "'git push origin v1.0.0' exited with exit code 128"
        );
    }

    #[test]
    fn test_command_wraps_intent() {
        let error = ReleaseError::command(
            "create a git tag",
            CommandError::Failed {
                program: "git".to_string(),
                args: vec!["tag".to_string()],
                code: Some(1),
            },
        );

        assert_eq!(error.code(), "COMMAND_ERROR");
        assert!(error.to_string().starts_with("create a git tag:"));
        assert!(!error.is_cancellation());
    }

    #[test]
    fn test_cancelled_command_becomes_cancellation() {
        let error = ReleaseError::command(
            "wait for workflow run",
            CommandError::Cancelled {
                program: "gh".to_string(),
            },
        );

        assert!(matches!(error, ReleaseError::Cancelled { .. }));
        assert!(error.is_cancellation());
        assert_eq!(error.code(), "CANCELLED");
    }

    #[test]
    fn test_publish_error_delegates_to_source() {
        let error = ReleaseError::Publish {
            kind: "Scoop".to_string(),
            target: "owner/bucket".to_string(),
            source: Box::new(ReleaseError::Cancelled {
                intent: "git push".to_string(),
            }),
        };

        assert!(error.is_cancellation());
        assert_eq!(error.code(), "CANCELLED");
        assert_eq!(
            error.to_string(),
            "process Scoop (owner/bucket): git push: cancelled"
        );
    }

    #[test]
    fn test_suggested_actions_present() {
        let errors = [
            ReleaseError::config("version argument is required"),
            ReleaseError::WorkflowRunNotFound {
                workflow: "release.yaml".to_string(),
            },
        ];

        for error in &errors {
            assert!(!error.suggested_actions().is_empty());
        }
    }
}
