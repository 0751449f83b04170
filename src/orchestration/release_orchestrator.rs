//! Release Orchestrator - the release pipeline
//!
//! Stages run strictly in order and every stage is a hard gate:
//!
//! 1. Tag the version and push the tag (skipped when a run ID is given)
//! 2. Stop here for prereleases
//! 3. Resolve the CI run and wait for it to finish
//! 4. Download the run's artifacts into a fresh temporary directory
//! 5. Publish to every selected package-manager target, stopping at the
//!    first failure
//!
//! Nothing is retried and nothing already pushed is rolled back.

use crate::core::cancel::CancelSignal;
use crate::core::config::ReleaseConfig;
use crate::core::config_loader::ReleaseEnvironment;
use crate::core::error::ReleaseError;
use crate::core::request::{PipelineState, PublishedTarget, ReleaseReport, ReleaseRequest};
use crate::core::state_machine::{ReleaseStage, ReleaseStateMachine};
use crate::core::template::BranchResolver;
use crate::core::traits::{
    CommandRunner, PackageKind, PackagePublisher, PublishContext, PublishOutcome,
    RepositoryMetadata,
};
use crate::orchestration::workflow_run::{WorkflowRunResolver, DEFAULT_GRACE_PERIOD};
use crate::plugins::{HomebrewPublisher, ScoopPublisher, WingetPublisher};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Prefix of the artifact directory created for each run
const TEMP_DIR_PREFIX: &str = "release-publisher-";

/// Scratch directories of the publish targets live here, inside the
/// artifact directory
const WORK_DIR: &str = "work";

/// Drives a release from tagging to publication
pub struct ReleaseOrchestrator {
    runner: Arc<dyn CommandRunner>,
    config: ReleaseConfig,
    environment: ReleaseEnvironment,
    project_dir: PathBuf,
    temp_root: PathBuf,
    grace_period: Duration,
    homebrew: HomebrewPublisher,
    scoop: ScoopPublisher,
    winget: WingetPublisher,
}

/// Everything shared by the targets of one publish stage
struct PublishRun<'a> {
    artifacts: &'a Path,
    work_dir: &'a Path,
    project_name: &'a str,
    version: &'a str,
    server_url: &'a str,
    cancel: &'a CancelSignal,
}

#[derive(Default)]
struct PublishTally {
    published: Vec<PublishedTarget>,
    skipped: Vec<String>,
}

impl ReleaseOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        metadata: Arc<dyn RepositoryMetadata>,
        config: ReleaseConfig,
        environment: ReleaseEnvironment,
    ) -> Self {
        let branches = BranchResolver::new(metadata);
        Self {
            homebrew: HomebrewPublisher::new(runner.clone(), branches.clone()),
            scoop: ScoopPublisher::new(runner.clone(), branches.clone()),
            winget: WingetPublisher::new(runner.clone(), branches),
            runner,
            config,
            environment,
            project_dir: PathBuf::from("."),
            temp_root: std::env::temp_dir(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Directory the tag is created in and `gh` queries run from
    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = project_dir.into();
        self
    }

    /// Delay between pushing the tag and looking up the workflow run
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Directory the artifact directory is created in
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    /// Execute the pipeline for `request`
    ///
    /// # Errors
    ///
    /// The first failing stage or target ends the pipeline. Publisher errors
    /// are wrapped in [`ReleaseError::Publish`] naming the kind and target.
    pub async fn execute(
        &self,
        request: &ReleaseRequest,
        cancel: &CancelSignal,
    ) -> Result<ReleaseReport, ReleaseError> {
        for name in request.selection().unknown_names() {
            warn!(name, "unknown package kind in selection, ignoring");
        }

        let mut stages = ReleaseStateMachine::new();
        let result = self.run_stages(request, cancel, &mut stages).await;
        if let Err(e) = &result {
            stages.transition(ReleaseStage::Failed);
            warn!(
                stage = %stages.failed_during().unwrap_or(ReleaseStage::Initial),
                error = %e,
                "release failed"
            );
        }
        result
    }

    async fn run_stages(
        &self,
        request: &ReleaseRequest,
        cancel: &CancelSignal,
        stages: &mut ReleaseStateMachine,
    ) -> Result<ReleaseReport, ReleaseError> {
        let version = request.version();
        let mut state = PipelineState::new(self.environment.server_url.as_str());

        if request.run_id().is_none() {
            stages.transition(ReleaseStage::Tagging);
            self.tag_release(cancel, version).await?;
        }

        if request.is_prerelease() {
            info!(version, "prerelease version, skipping publication");
            stages.transition(ReleaseStage::Success);
            return Ok(Self::report(request, &state, PublishTally::default(), stages));
        }

        stages.transition(ReleaseStage::AwaitingRun);
        let runs = WorkflowRunResolver::new(self.runner.clone(), self.project_dir.as_path())
            .with_grace_period(self.grace_period);
        let run_id = runs
            .resolve_and_await(cancel, request.workflow(), request.run_id())
            .await?;
        state.set_run_id(run_id);

        stages.transition(ReleaseStage::RetrievingArtifacts);
        let artifact_dir = self.retrieve_artifacts(&runs, request, &state, cancel).await?;
        state.set_artifact_dir(artifact_dir);

        stages.transition(ReleaseStage::Publishing);
        let tally = self.publish(request, &state, cancel).await?;

        stages.transition(ReleaseStage::Success);
        info!(
            version,
            published = tally.published.len(),
            "release completed"
        );
        Ok(Self::report(request, &state, tally, stages))
    }

    async fn tag_release(&self, cancel: &CancelSignal, version: &str) -> Result<(), ReleaseError> {
        let message = format!("chore: release {}", version);
        info!(version, "creating a git tag");
        self.runner
            .run(
                cancel,
                &self.project_dir,
                "git",
                &["tag", "-m", message.as_str(), version],
            )
            .await
            .map_err(|e| ReleaseError::command("create a git tag", e))?;

        info!(version, "pushing a git tag");
        self.runner
            .run(cancel, &self.project_dir, "git", &["push", "origin", version])
            .await
            .map_err(|e| ReleaseError::command("push a git tag", e))
    }

    /// Download the run's artifacts into a new directory that outlives the
    /// pipeline, so they can be inspected afterwards. The directory is
    /// removed when the download fails.
    async fn retrieve_artifacts(
        &self,
        runs: &WorkflowRunResolver,
        request: &ReleaseRequest,
        state: &PipelineState,
        cancel: &CancelSignal,
    ) -> Result<PathBuf, ReleaseError> {
        let run_id = state.run_id().unwrap_or_default();
        let repository = match request.repository() {
            Some(repository) => repository.to_string(),
            None => runs.release_repository(cancel).await?,
        };

        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(&self.temp_root)
            .map_err(|e| {
                ReleaseError::filesystem("create a temporary directory", &self.temp_root, e)
            })?;

        runs.download_artifacts(cancel, dir.path(), &repository, run_id, request.artifact_name())
            .await?;
        let dir = dir.keep();

        if !dir.join(request.artifact_name()).is_dir() {
            warn!(
                artifact = request.artifact_name(),
                dir = %dir.display(),
                "the downloaded artifacts contain no matching directory"
            );
        }
        Ok(dir)
    }

    async fn publish(
        &self,
        request: &ReleaseRequest,
        state: &PipelineState,
        cancel: &CancelSignal,
    ) -> Result<PublishTally, ReleaseError> {
        let artifact_dir = state
            .artifact_dir()
            .ok_or_else(|| ReleaseError::config("artifacts were not retrieved"))?;
        let artifacts = artifact_dir.join(request.artifact_name());
        let work_dir = artifact_dir.join(WORK_DIR);
        let run = PublishRun {
            artifacts: &artifacts,
            work_dir: &work_dir,
            project_name: &self.config.project_name,
            version: request.version(),
            server_url: state.server_url(),
            cancel,
        };

        let mut tally = PublishTally::default();
        for kind in PackageKind::ALL {
            if !request.selection().is_eligible(kind) {
                info!(kind = %kind, "not selected, skipping");
                continue;
            }

            match kind {
                PackageKind::Homebrew => {
                    publish_targets(&self.homebrew, self.config.homebrew_targets(), &run, &mut tally)
                        .await?
                }
                PackageKind::Scoop => {
                    publish_targets(&self.scoop, self.config.scoop_targets(), &run, &mut tally)
                        .await?
                }
                PackageKind::Winget => {
                    publish_targets(&self.winget, self.config.winget_targets(), &run, &mut tally)
                        .await?
                }
            }
        }
        Ok(tally)
    }

    fn report(
        request: &ReleaseRequest,
        state: &PipelineState,
        tally: PublishTally,
        stages: &ReleaseStateMachine,
    ) -> ReleaseReport {
        ReleaseReport {
            version: request.version().to_string(),
            run_id: state.run_id().map(str::to_string),
            artifact_dir: state.artifact_dir().map(Path::to_path_buf),
            published: tally.published,
            skipped: tally.skipped,
            prerelease: request.is_prerelease(),
            stages: stages.transitions().to_vec(),
            completed_at: Utc::now(),
        }
    }
}

/// Publish every target of one kind, in configuration order
///
/// Each target gets its own scratch directory `<work>/<kind>-<n>`.
async fn publish_targets<'t, P, I>(
    publisher: &P,
    targets: I,
    run: &PublishRun<'_>,
    tally: &mut PublishTally,
) -> Result<(), ReleaseError>
where
    P: PackagePublisher,
    P::Target: 't,
    I: IntoIterator<Item = &'t P::Target>,
{
    let kind = publisher.kind();
    for (index, target) in targets.into_iter().enumerate() {
        let label = publisher.label(target);
        let wrap = |source: ReleaseError| ReleaseError::Publish {
            kind: kind.display_name().to_string(),
            target: label.clone(),
            source: Box::new(source),
        };

        let scratch = run.work_dir.join(format!("{}-{}", kind.as_str(), index));
        std::fs::create_dir_all(&scratch)
            .map_err(|e| wrap(ReleaseError::filesystem("create a scratch directory", &scratch, e)))?;

        info!(kind = %kind, target = %label, "publishing");
        let ctx = PublishContext {
            artifacts: run.artifacts,
            scratch: &scratch,
            project_name: run.project_name,
            version: run.version,
            server_url: run.server_url,
            cancel: run.cancel,
        };
        match publisher.publish(target, &ctx).await.map_err(wrap)? {
            PublishOutcome::Published {
                repository,
                branch,
                pull_request,
            } => {
                info!(kind = %kind, repo = %repository, branch = %branch, "published");
                tally.published.push(PublishedTarget {
                    kind,
                    repository,
                    branch,
                    pull_request,
                });
            }
            PublishOutcome::Skipped { reason } => {
                tally.skipped.push(format!("{} ({}): {}", kind, label, reason));
            }
        }
    }
    Ok(())
}
