//! Core traits and types for the release pipeline
//!
//! This module defines the capabilities the pipeline consumes (command
//! execution, repository metadata) and the publisher abstraction shared by
//! the package-manager plugins.

use crate::core::cancel::CancelSignal;
use crate::core::error::{CommandError, ReleaseError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// Package kinds
// ============================================================================

/// Package-manager kind a target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Homebrew,
    Scoop,
    Winget,
}

impl PackageKind {
    /// All kinds, in publication order
    pub const ALL: [PackageKind; 3] = [Self::Homebrew, Self::Scoop, Self::Winget];

    /// Selection name (as passed with `--publish`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Homebrew => "homebrew",
            Self::Scoop => "scoop",
            Self::Winget => "winget",
        }
    }

    /// Human readable name used in logs and error chains
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Homebrew => "Homebrew",
            Self::Scoop => "Scoop",
            Self::Winget => "Winget",
        }
    }

    /// Name of the artifact subdirectory holding this kind's files
    pub fn artifact_subdir(&self) -> &'static str {
        self.as_str()
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Executes external programs on behalf of the pipeline
///
/// Both methods must honour `cancel`: when it fires the running program
/// receives an interrupt and the call fails with [`CommandError::Cancelled`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program for its side effects; its output is passed through
    async fn run(
        &self,
        cancel: &CancelSignal,
        dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<(), CommandError>;

    /// Run a program and capture its standard output, trimmed
    async fn output(
        &self,
        cancel: &CancelSignal,
        dir: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<String, CommandError>;
}

/// Answers questions about remote repositories
#[async_trait]
pub trait RepositoryMetadata: Send + Sync {
    /// Default branch of `owner/name`
    async fn default_branch(&self, owner: &str, name: &str) -> anyhow::Result<String>;
}

// ============================================================================
// Publishing
// ============================================================================

/// Everything a publisher needs to know about the current release
#[derive(Debug, Clone, Copy)]
pub struct PublishContext<'a> {
    /// Downloaded artifact root (`<artifactDir>/<artifactName>`)
    pub artifacts: &'a Path,
    /// Fresh scratch directory owned by this target
    pub scratch: &'a Path,
    pub project_name: &'a str,
    pub version: &'a str,
    /// Git hosting origin used to build clone URLs
    pub server_url: &'a str,
    pub cancel: &'a CancelSignal,
}

impl PublishContext<'_> {
    /// Clone URL of `owner/name` on the configured server
    pub fn repository_url(&self, owner: &str, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.server_url.trim_end_matches('/'),
            owner,
            name
        )
    }
}

/// Result of publishing a single target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PublishOutcome {
    /// The new version was pushed to `repository` on `branch`
    Published {
        repository: String,
        branch: String,
        /// Repository a pull request was proposed to
        #[serde(skip_serializing_if = "Option::is_none")]
        pull_request: Option<String>,
    },
    /// Nothing to publish for this target
    Skipped { reason: String },
}

/// A package-manager publisher
///
/// Each implementation propagates a new version to one kind of target
/// repository. Publishing is idempotent per target and independent of the
/// other targets.
#[async_trait]
pub trait PackagePublisher: Send + Sync {
    /// Target descriptor from the configuration
    type Target: Send + Sync;

    /// Kind handled by this publisher
    fn kind(&self) -> PackageKind;

    /// Short identification of a target for logs and error chains
    fn label(&self, target: &Self::Target) -> String;

    /// Propagate the new version to `target`
    async fn publish(
        &self,
        target: &Self::Target,
        ctx: &PublishContext<'_>,
    ) -> Result<PublishOutcome, ReleaseError>;
}

// ============================================================================
// Test doubles
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_kind_names() {
        assert_eq!(PackageKind::Homebrew.as_str(), "homebrew");
        assert_eq!(PackageKind::Scoop.to_string(), "Scoop");
        assert_eq!(PackageKind::parse("winget"), Some(PackageKind::Winget));
        assert_eq!(PackageKind::parse("chocolatey"), None);
    }

    #[test]
    fn test_publication_order() {
        assert_eq!(
            PackageKind::ALL,
            [PackageKind::Homebrew, PackageKind::Scoop, PackageKind::Winget]
        );
    }

    #[test]
    fn test_repository_url_trims_trailing_slash() {
        let cancel = CancelSignal::never();
        let ctx = PublishContext {
            artifacts: Path::new("/tmp/a"),
            scratch: Path::new("/tmp/s"),
            project_name: "tool",
            version: "v1.0.0",
            server_url: "https://ghe.example.com/",
            cancel: &cancel,
        };

        assert_eq!(
            ctx.repository_url("octo", "homebrew-tap"),
            "https://ghe.example.com/octo/homebrew-tap"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = PublishOutcome::Skipped {
            reason: "no artifacts".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"skipped","reason":"no artifacts"}"#);
    }
}
