//! Homebrew Plugin - formula and cask tap publishing
//!
//! Clones the tap, copies the generated `homebrew/` tree over it, commits
//! and pushes to the tap's branch.

use crate::core::config::Repository;
use crate::core::error::ReleaseError;
use crate::core::fs_ops;
use crate::core::template::BranchResolver;
use crate::core::traits::{
    CommandRunner, PackageKind, PackagePublisher, PublishContext, PublishOutcome,
};
use crate::plugins::git_workspace::GitWorkspace;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const TAP_PREFIX: &str = "homebrew-";

/// Homebrew tap publisher
pub struct HomebrewPublisher {
    runner: Arc<dyn CommandRunner>,
    branches: BranchResolver,
}

impl HomebrewPublisher {
    pub fn new(runner: Arc<dyn CommandRunner>, branches: BranchResolver) -> Self {
        Self { runner, branches }
    }

    /// Tap repository name for `target`
    ///
    /// `tools` becomes `homebrew-tools`, an empty name uses the project name.
    pub fn tap_name(target: &Repository, project_name: &str) -> String {
        let name = if target.name.is_empty() {
            project_name
        } else {
            target.name.as_str()
        };
        if name.starts_with(TAP_PREFIX) {
            name.to_string()
        } else {
            format!("{}{}", TAP_PREFIX, name)
        }
    }
}

#[async_trait]
impl PackagePublisher for HomebrewPublisher {
    type Target = Repository;

    fn kind(&self) -> PackageKind {
        PackageKind::Homebrew
    }

    fn label(&self, target: &Repository) -> String {
        target.slug()
    }

    async fn publish(
        &self,
        target: &Repository,
        ctx: &PublishContext<'_>,
    ) -> Result<PublishOutcome, ReleaseError> {
        let source = ctx.artifacts.join(self.kind().artifact_subdir());
        if !fs_ops::dir_exists(&source) {
            info!("Homebrew-tap recipe isn't found");
            return Ok(PublishOutcome::Skipped {
                reason: format!("{} does not exist", source.display()),
            });
        }
        if target.owner.is_empty() {
            return Err(ReleaseError::config("homebrew repository owner is required"));
        }

        let tap = Self::tap_name(target, ctx.project_name);
        let url = ctx.repository_url(&target.owner, &tap);
        let scratch = GitWorkspace::new(self.runner.as_ref(), ctx.cancel, ctx.scratch);

        info!(repo = %url, "cloning homebrew repository");
        scratch
            .shallow_clone("clone homebrew repository", &url)
            .await?;

        let clone = scratch.at(&ctx.scratch.join(&tap));
        fs_ops::copy_tree(&source, clone.dir())?;

        info!("committing and pushing homebrew changes");
        clone.git("git add", &["add", "."]).await?;
        clone
            .commit(&format!(
                "Brew formula update for {} version {}",
                ctx.project_name, ctx.version
            ))
            .await?;

        let branch = self
            .branches
            .literal_or_default(&target.branch, &target.owner, &tap)
            .await?;
        clone.push("git push", "origin", &branch).await?;

        Ok(PublishOutcome::Published {
            repository: format!("{}/{}", target.owner, tap),
            branch,
            pull_request: None,
        })
    }
}
