//! Winget Plugin - manifest publishing through a fork and a pull request
//!
//! The canonical package repository is never pushed to. A local clone is
//! built from the tip of the base branch, the manifests are replaced, the
//! result is pushed to the contributor's fork and proposed upstream.

use crate::core::config::WingetTarget;
use crate::core::error::ReleaseError;
use crate::core::fs_ops;
use crate::core::template::BranchResolver;
use crate::core::traits::{
    CommandRunner, PackageKind, PackagePublisher, PublishContext, PublishOutcome,
};
use crate::plugins::git_workspace::GitWorkspace;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const MANIFESTS_DIR: &str = "manifests";
const PULL_REQUEST_TEMPLATE: &str = ".github/PULL_REQUEST_TEMPLATE.md";

/// Fully resolved settings of one winget target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkPlan {
    pub package_id: String,
    pub fork_owner: String,
    pub fork_name: String,
    pub base_owner: String,
    pub base_name: String,
    pub base_branch: String,
    pub head_branch: String,
    pub pull_request: bool,
}

/// Winget fork-and-pull-request publisher
pub struct WingetPublisher {
    runner: Arc<dyn CommandRunner>,
    branches: BranchResolver,
}

impl WingetPublisher {
    pub fn new(runner: Arc<dyn CommandRunner>, branches: BranchResolver) -> Self {
        Self { runner, branches }
    }

    /// Resolve names and branches before any command runs
    pub async fn plan(
        &self,
        target: &WingetTarget,
        project_name: &str,
        version: &str,
    ) -> Result<ForkPlan, ReleaseError> {
        let fork = &target.repository;
        let base = &fork.pull_request.base;

        if target.publisher.is_empty() {
            return Err(ReleaseError::config("winget publisher is required"));
        }
        if fork.owner.is_empty() || fork.name.is_empty() {
            return Err(ReleaseError::config(
                "winget repository owner and name are required",
            ));
        }
        if base.owner.is_empty() {
            return Err(ReleaseError::config(
                "winget pull_request.base.owner is required",
            ));
        }

        let base_name = if base.name.is_empty() {
            fork.name.clone()
        } else {
            base.name.clone()
        };
        let base_branch = if base.branch.is_empty() {
            self.branches.default_branch(&base.owner, &base_name).await?
        } else {
            base.branch.clone()
        };
        let head_branch = self
            .branches
            .resolve(&fork.branch, version, &fork.owner, &fork.name)
            .await?;

        Ok(ForkPlan {
            package_id: format!("{}.{}", target.publisher, project_name),
            fork_owner: fork.owner.clone(),
            fork_name: fork.name.clone(),
            base_owner: base.owner.clone(),
            base_name,
            base_branch,
            head_branch,
            pull_request: fork.pull_request.enabled,
        })
    }
}

#[async_trait]
impl PackagePublisher for WingetPublisher {
    type Target = WingetTarget;

    fn kind(&self) -> PackageKind {
        PackageKind::Winget
    }

    fn label(&self, target: &WingetTarget) -> String {
        format!("{}/{}", target.repository.owner, target.repository.name)
    }

    async fn publish(
        &self,
        target: &WingetTarget,
        ctx: &PublishContext<'_>,
    ) -> Result<PublishOutcome, ReleaseError> {
        let source = ctx.artifacts.join(self.kind().artifact_subdir());
        if !fs_ops::dir_exists(&source) {
            info!("Winget manifest isn't found");
            return Ok(PublishOutcome::Skipped {
                reason: format!("{} does not exist", source.display()),
            });
        }

        let plan = self.plan(target, ctx.project_name, ctx.version).await?;
        let base_url = ctx.repository_url(&plan.base_owner, &plan.base_name);
        let fork_url = ctx.repository_url(&plan.fork_owner, &plan.fork_name);
        info!(
            base = %base_url,
            fork = %fork_url,
            branch = %plan.head_branch,
            "setting up winget repository"
        );

        let scratch = GitWorkspace::new(self.runner.as_ref(), ctx.cancel, ctx.scratch);
        scratch.git("git init", &["init", plan.base_name.as_str()]).await?;

        let repo_dir = ctx.scratch.join(&plan.base_name);
        let clone = scratch.at(&repo_dir);
        clone
            .git("add origin remote", &["remote", "add", "origin", base_url.as_str()])
            .await?;
        clone
            .git(
                "fetch origin",
                &["fetch", "--depth=1", "origin", plan.base_branch.as_str()],
            )
            .await?;
        let start_point = format!("origin/{}", plan.base_branch);
        clone
            .git(
                "checkout branch",
                &["checkout", "-b", plan.head_branch.as_str(), start_point.as_str()],
            )
            .await?;

        let manifests = repo_dir.join(MANIFESTS_DIR);
        fs_ops::remove_tree(&manifests)?;
        fs_ops::copy_tree(&source.join(MANIFESTS_DIR), &manifests)?;

        info!("committing winget changes");
        stage_manifests(&clone, &manifests, &repo_dir).await?;
        clone
            .commit(&format!("Update {} to {}", plan.package_id, ctx.version))
            .await?;

        clone
            .git("add fork remote", &["remote", "add", "fork", fork_url.as_str()])
            .await?;
        clone
            .push("push to fork", "fork", &plan.head_branch)
            .await?;

        let fork_slug = format!("{}/{}", plan.fork_owner, plan.fork_name);
        if !plan.pull_request {
            info!(fork = %fork_slug, "pull request creation is disabled");
            return Ok(PublishOutcome::Published {
                repository: fork_slug,
                branch: plan.head_branch,
                pull_request: None,
            });
        }
        if target.repository.pull_request.draft {
            warn!("draft pull requests can't be opened in the browser, opening a regular one");
        }

        info!("creating pull request");
        clone
            .gh("set default repo", &["repo", "set-default", base_url.as_str()])
            .await?;

        let title = format!("New version: {} {}", plan.package_id, ctx.version);
        let head = format!("{}:{}", plan.fork_owner, plan.head_branch);
        let template = repo_dir.join(PULL_REQUEST_TEMPLATE);
        let template_arg = template.to_string_lossy();
        let mut args = vec!["pr", "create", "--title", title.as_str(), "--head", head.as_str()];
        if fs_ops::file_exists(&template) {
            args.extend(["--body-file", &*template_arg]);
        } else {
            args.extend(["--body", ""]);
        }
        args.push("--web");
        clone.gh("create pull request", &args).await?;

        Ok(PublishOutcome::Published {
            repository: fork_slug,
            branch: plan.head_branch,
            pull_request: Some(format!("{}/{}", plan.base_owner, plan.base_name)),
        })
    }
}

/// Stage every file under `manifests` by its path relative to the clone
async fn stage_manifests(
    clone: &GitWorkspace<'_>,
    manifests: &Path,
    repo_dir: &Path,
) -> Result<(), ReleaseError> {
    let files: Vec<String> = fs_ops::list_files(manifests, repo_dir)?
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    if files.is_empty() {
        return Err(ReleaseError::filesystem(
            "add manifest files",
            manifests,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no manifest files"),
        ));
    }

    let mut args = vec!["add"];
    args.extend(files.iter().map(String::as_str));
    clone.git("add manifest files", &args).await
}
