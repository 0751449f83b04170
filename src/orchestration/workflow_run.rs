//! Workflow Run Resolver
//!
//! Finds the CI run that builds a release and blocks until it finishes,
//! then retrieves its artifacts. Every query goes through the `gh` CLI.

use crate::core::cancel::CancelSignal;
use crate::core::error::{CommandError, ReleaseError};
use crate::core::traits::CommandRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Time given to CI to register the run triggered by a tag push
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

pub struct WorkflowRunResolver {
    runner: Arc<dyn CommandRunner>,
    project_dir: PathBuf,
    grace_period: Duration,
}

impl WorkflowRunResolver {
    pub fn new(runner: Arc<dyn CommandRunner>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_dir: project_dir.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Determine the run of `workflow` and wait until it is terminal
    ///
    /// A `known` run ID is trusted verbatim and skips discovery. Otherwise
    /// the grace period elapses first and a single lookup follows; there is
    /// no polling.
    pub async fn resolve_and_await(
        &self,
        cancel: &CancelSignal,
        workflow: &str,
        known: Option<&str>,
    ) -> Result<String, ReleaseError> {
        let run_id = match known {
            Some(run_id) => {
                info!(run_id, "using the given workflow run");
                run_id.to_string()
            }
            None => {
                self.wait_for_registration(cancel).await?;
                self.discover(cancel, workflow).await?
            }
        };

        self.watch(cancel, &run_id).await?;
        Ok(run_id)
    }

    async fn wait_for_registration(&self, cancel: &CancelSignal) -> Result<(), ReleaseError> {
        info!(
            seconds = self.grace_period.as_secs(),
            "waiting for the workflow run to be created"
        );
        if !cancel.sleep(self.grace_period).await {
            return Err(ReleaseError::Cancelled {
                intent: "wait for the workflow run to be created".to_string(),
            });
        }
        Ok(())
    }

    /// ID of the most recent run of `workflow`
    pub async fn discover(
        &self,
        cancel: &CancelSignal,
        workflow: &str,
    ) -> Result<String, ReleaseError> {
        info!(workflow, "getting the workflow run id");
        let output = self
            .runner
            .output(
                cancel,
                &self.project_dir,
                "gh",
                &[
                    "run",
                    "list",
                    "-w",
                    workflow,
                    "-L",
                    "1",
                    "--json",
                    "databaseId",
                    "--jq",
                    ".[].databaseId",
                ],
            )
            .await
            .map_err(|e| ReleaseError::command("get a workflow run id", e))?;

        parse_run_id(workflow, &output)
    }

    /// Block until run `run_id` is terminal; a failed run is an error
    pub async fn watch(&self, cancel: &CancelSignal, run_id: &str) -> Result<(), ReleaseError> {
        info!(run_id, "waiting for the workflow run to finish");
        self.runner
            .run(
                cancel,
                &self.project_dir,
                "gh",
                &["run", "watch", "--exit-status", run_id],
            )
            .await
            .map_err(|e| match e {
                CommandError::Failed { .. } => ReleaseError::WorkflowRunFailed {
                    run_id: run_id.to_string(),
                    source: e,
                },
                other => ReleaseError::command("watch the workflow run", other),
            })
    }

    /// `owner/name` of the repository being released
    pub async fn release_repository(&self, cancel: &CancelSignal) -> Result<String, ReleaseError> {
        let repository = self
            .runner
            .output(
                cancel,
                &self.project_dir,
                "gh",
                &["repo", "view", "--json", "nameWithOwner", "--jq", ".nameWithOwner"],
            )
            .await
            .map_err(|e| ReleaseError::command("get the repository name", e))?;

        if repository.is_empty() {
            return Err(ReleaseError::config(
                "the repository name could not be determined, pass --repo",
            ));
        }
        Ok(repository)
    }

    /// Download the artifacts of run `run_id` matching `pattern` into `dir`
    pub async fn download_artifacts(
        &self,
        cancel: &CancelSignal,
        dir: &Path,
        repository: &str,
        run_id: &str,
        pattern: &str,
    ) -> Result<(), ReleaseError> {
        info!(run_id, dir = %dir.display(), "downloading artifacts");
        self.runner
            .run(
                cancel,
                dir,
                "gh",
                &["run", "download", "-R", repository, run_id, "--pattern", pattern],
            )
            .await
            .map_err(|e| ReleaseError::command("download artifacts", e))
    }
}

/// A run ID is a non-empty string of ASCII digits; anything else means the
/// lookup did not identify exactly one run
fn parse_run_id(workflow: &str, output: &str) -> Result<String, ReleaseError> {
    let output = output.trim();
    if output.is_empty() {
        return Err(ReleaseError::WorkflowRunNotFound {
            workflow: workflow.to_string(),
        });
    }
    if !output.chars().all(|c| c.is_ascii_digit()) {
        return Err(ReleaseError::AmbiguousWorkflowRun {
            workflow: workflow.to_string(),
            output: output.to_string(),
        });
    }
    Ok(output.to_string())
}
