//! Git operations scoped to one local clone

use crate::core::cancel::CancelSignal;
use crate::core::error::ReleaseError;
use crate::core::traits::CommandRunner;
use std::path::{Path, PathBuf};

/// A working directory that git (and gh) commands run in
///
/// Every command is tagged with the intent reported when it fails.
pub(crate) struct GitWorkspace<'a> {
    runner: &'a dyn CommandRunner,
    cancel: &'a CancelSignal,
    dir: PathBuf,
}

impl<'a> GitWorkspace<'a> {
    pub(crate) fn new(runner: &'a dyn CommandRunner, cancel: &'a CancelSignal, dir: &Path) -> Self {
        Self {
            runner,
            cancel,
            dir: dir.to_path_buf(),
        }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Same runner and signal, another directory
    pub(crate) fn at(&self, dir: &Path) -> GitWorkspace<'a> {
        GitWorkspace::new(self.runner, self.cancel, dir)
    }

    pub(crate) async fn git(&self, intent: &str, args: &[&str]) -> Result<(), ReleaseError> {
        self.exec(intent, "git", args).await
    }

    pub(crate) async fn gh(&self, intent: &str, args: &[&str]) -> Result<(), ReleaseError> {
        self.exec(intent, "gh", args).await
    }

    async fn exec(&self, intent: &str, program: &str, args: &[&str]) -> Result<(), ReleaseError> {
        self.runner
            .run(self.cancel, &self.dir, program, args)
            .await
            .map_err(|e| ReleaseError::command(intent, e))
    }

    /// `git clone --depth 1 <url>` into this directory
    pub(crate) async fn shallow_clone(&self, intent: &str, url: &str) -> Result<(), ReleaseError> {
        self.git(intent, &["clone", "--depth", "1", url]).await
    }

    pub(crate) async fn commit(&self, message: &str) -> Result<(), ReleaseError> {
        self.git("git commit", &["commit", "-m", message]).await
    }

    pub(crate) async fn push(&self, intent: &str, remote: &str, branch: &str) -> Result<(), ReleaseError> {
        self.git(intent, &["push", remote, branch]).await
    }
}
