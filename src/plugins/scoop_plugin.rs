//! Scoop Plugin - bucket manifest publishing

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
use tracing::{debug, info};

/// Only manifests are copied into the bucket
const MANIFEST_EXTENSION: &str = "json";

/// Scoop bucket publisher
pub struct ScoopPublisher {
    runner: Arc<dyn CommandRunner>,
    branches: BranchResolver,
}

impl ScoopPublisher {
    pub fn new(runner: Arc<dyn CommandRunner>, branches: BranchResolver) -> Self {
        Self { runner, branches }
    }
}

#[async_trait]
impl PackagePublisher for ScoopPublisher {
    type Target = Repository;

    fn kind(&self) -> PackageKind {
        PackageKind::Scoop
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
            info!("Scoop manifest isn't found");
            return Ok(PublishOutcome::Skipped {
                reason: format!("{} does not exist", source.display()),
            });
        }
        if target.owner.is_empty() || target.name.is_empty() {
            return Err(ReleaseError::config(
                "scoop repository owner and name are required",
            ));
        }

        let url = ctx.repository_url(&target.owner, &target.name);
        let scratch = GitWorkspace::new(self.runner.as_ref(), ctx.cancel, ctx.scratch);

        info!(repo = %url, "cloning scoop repository");
        scratch.shallow_clone("clone scoop repository", &url).await?;

        let clone = scratch.at(&ctx.scratch.join(&target.name));
        let copied = fs_ops::copy_files_with_extension(&source, clone.dir(), MANIFEST_EXTENSION)?;
        debug!(files = ?copied, "copied scoop manifests");

        info!("committing and pushing scoop changes");
        clone.git("git add", &["add", "*.json"]).await?;
        clone
            .commit(&format!(
                "Scoop update for {} version {}",
                ctx.project_name, ctx.version
            ))
            .await?;

        let branch = self
            .branches
            .literal_or_default(&target.branch, &target.owner, &target.name)
            .await?;
        clone.push("git push", "origin", &branch).await?;

        Ok(PublishOutcome::Published {
            repository: target.slug(),
            branch,
            pull_request: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cancel::CancelSignal;
    use crate::core::traits::testing::{RecordingRunner, StaticMetadata};
    use std::path::Path;
    use tempfile::TempDir;

    fn bucket(branch: &str) -> Repository {
        Repository {
            owner: "octo".to_string(),
            name: "scoop-bucket".to_string(),
            branch: branch.to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_copies_only_manifests() {
        let temp_dir = TempDir::new().unwrap();
        let artifacts = temp_dir.path().join("goreleaser");
        let scoop = artifacts.join("scoop");
        std::fs::create_dir_all(&scoop).unwrap();
        std::fs::write(scoop.join("tool.json"), "{}").unwrap();
        std::fs::write(scoop.join("checksums.txt"), "abc").unwrap();
        let scratch = temp_dir.path().join("work");
        std::fs::create_dir_all(&scratch).unwrap();

        let clone = scratch.join("scoop-bucket");
        let runner = Arc::new(RecordingRunner::new().on(
            "git clone",
            move |_: &Path, _: &[&str]| std::fs::create_dir_all(&clone).unwrap(),
        ));
        let metadata = Arc::new(StaticMetadata::new().with_branch("octo/scoop-bucket", "master"));
        let publisher = ScoopPublisher::new(runner.clone(), BranchResolver::new(metadata.clone()));
        let cancel = CancelSignal::never();
        let ctx = PublishContext {
            artifacts: &artifacts,
            scratch: &scratch,
            project_name: "tool",
            version: "v1.2.3",
            server_url: "https://github.com",
            cancel: &cancel,
        };

        let outcome = publisher.publish(&bucket(""), &ctx).await.unwrap();

        assert_eq!(
            runner.lines(),
            vec![
                "git clone --depth 1 https://github.com/octo/scoop-bucket",
                "git add *.json",
                "git commit -m Scoop update for tool version v1.2.3",
                "git push origin master",
            ]
        );
        assert!(scratch.join("scoop-bucket/tool.json").exists());
        assert!(!scratch.join("scoop-bucket/checksums.txt").exists());
        assert_eq!(metadata.lookups(), vec!["octo/scoop-bucket"]);
        assert!(matches!(outcome, PublishOutcome::Published { branch, .. } if branch == "master"));
    }

    #[tokio::test]
    async fn test_missing_artifacts_skip() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let publisher = ScoopPublisher::new(
            runner.clone(),
            BranchResolver::new(Arc::new(StaticMetadata::new())),
        );
        let cancel = CancelSignal::never();
        let ctx = PublishContext {
            artifacts: temp_dir.path(),
            scratch: temp_dir.path(),
            project_name: "tool",
            version: "v1.2.3",
            server_url: "https://github.com",
            cancel: &cancel,
        };

        let outcome = publisher.publish(&bucket("main"), &ctx).await.unwrap();

        assert!(matches!(outcome, PublishOutcome::Skipped { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_stops_before_push() {
        let temp_dir = TempDir::new().unwrap();
        let artifacts = temp_dir.path().join("goreleaser");
        std::fs::create_dir_all(artifacts.join("scoop")).unwrap();
        let scratch = temp_dir.path().join("work");
        std::fs::create_dir_all(scratch.join("scoop-bucket")).unwrap();

        let runner = Arc::new(RecordingRunner::new());
        let publisher = ScoopPublisher::new(
            runner.clone(),
            BranchResolver::new(Arc::new(StaticMetadata::new())),
        );
        let cancel = CancelSignal::never();
        let ctx = PublishContext {
            artifacts: &artifacts,
            scratch: &scratch,
            project_name: "tool",
            version: "v1.2.3",
            server_url: "https://github.com",
            cancel: &cancel,
        };

        let error = publisher.publish(&bucket(""), &ctx).await.unwrap_err();

        assert_eq!(error.code(), "METADATA_ERROR");
        assert!(!runner.lines().iter().any(|line| line.starts_with("git push")));
    }
}
