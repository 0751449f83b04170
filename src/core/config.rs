//! Configuration structures for release-publisher
//!
//! The configuration is read from the project's `.goreleaser.yaml`; only the
//! sections describing package-manager targets are modelled, every other key
//! is ignored.

use serde::{Deserialize, Serialize};

/// Root configuration object
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReleaseConfig {
    /// Project name used in tap names, commit messages and package identifiers
    #[serde(default)]
    pub project_name: String,

    /// Homebrew casks (published to a tap)
    #[serde(default)]
    pub homebrew_casks: Vec<HomebrewTarget>,

    /// Homebrew formulae (published to a tap)
    #[serde(default)]
    pub brews: Vec<HomebrewTarget>,

    /// Scoop buckets
    #[serde(default)]
    pub scoops: Vec<ScoopTarget>,

    /// Winget package repositories (fork + pull request)
    #[serde(default)]
    pub winget: Vec<WingetTarget>,
}

impl ReleaseConfig {
    /// Homebrew targets in publication order: casks first, then formulae
    pub fn homebrew_targets(&self) -> impl Iterator<Item = &Repository> {
        self.homebrew_casks
            .iter()
            .chain(self.brews.iter())
            .map(|target| &target.repository)
    }

    pub fn scoop_targets(&self) -> impl Iterator<Item = &Repository> {
        self.scoops.iter().map(|target| &target.repository)
    }

    pub fn winget_targets(&self) -> impl Iterator<Item = &WingetTarget> {
        self.winget.iter()
    }
}

/// Git-hosted repository with an optional explicit branch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub name: String,

    /// Branch to push to; empty means the repository's default branch
    #[serde(default)]
    pub branch: String,
}

impl Repository {
    /// `owner/name`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Homebrew cask or formula target
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HomebrewTarget {
    #[serde(default)]
    pub repository: Repository,
}

/// Scoop bucket target
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoopTarget {
    #[serde(default)]
    pub repository: Repository,
}

/// Winget target: a fork of the canonical package repository
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WingetTarget {
    /// Publisher part of the package identifier (`<publisher>.<project>`)
    #[serde(default)]
    pub publisher: String,

    #[serde(default)]
    pub repository: WingetRepository,
}

/// The contributor's fork and how to propose changes upstream
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WingetRepository {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub name: String,

    /// Head branch template (may contain `{{.Version}}`)
    #[serde(default)]
    pub branch: String,

    #[serde(default)]
    pub pull_request: PullRequest,
}

/// Pull request settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub draft: bool,

    /// Canonical repository the pull request targets
    #[serde(default)]
    pub base: Repository,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReleaseConfig::default();
        assert!(config.project_name.is_empty());
        assert_eq!(config.homebrew_targets().count(), 0);
    }

    #[test]
    fn test_deserialize_goreleaser_sections() {
        let yaml = r#"
version: 2
project_name: tool
builds:
  - env: [CGO_ENABLED=0]
brews:
  - repository:
      owner: octo
      name: homebrew-tap
scoops:
  - repository:
      owner: octo
      name: scoop-bucket
      branch: release
winget:
  - publisher: octo
    repository:
      owner: octo
      name: winget-pkgs
      branch: "tool-{{.Version}}"
      pull_request:
        enabled: true
        base:
          owner: microsoft
          name: winget-pkgs
          branch: master
"#;
        let config: ReleaseConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.project_name, "tool");
        assert_eq!(config.brews[0].repository.slug(), "octo/homebrew-tap");
        assert_eq!(config.scoops[0].repository.branch, "release");

        let winget = &config.winget[0];
        assert_eq!(winget.repository.branch, "tool-{{.Version}}");
        assert!(winget.repository.pull_request.enabled);
        assert!(!winget.repository.pull_request.draft);
        assert_eq!(winget.repository.pull_request.base.owner, "microsoft");
    }

    #[test]
    fn test_homebrew_targets_casks_first() {
        let yaml = r#"
brews:
  - repository: {owner: octo, name: formula}
homebrew_casks:
  - repository: {owner: octo, name: cask}
"#;
        let config: ReleaseConfig = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<&str> = config.homebrew_targets().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["cask", "formula"]);
    }

    #[test]
    fn test_serialize_roundtrip_keeps_targets() {
        let config = ReleaseConfig {
            project_name: "tool".to_string(),
            scoops: vec![ScoopTarget {
                repository: Repository {
                    owner: "octo".to_string(),
                    name: "bucket".to_string(),
                    branch: String::new(),
                },
            }],
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("project_name: tool"));

        let parsed: ReleaseConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
