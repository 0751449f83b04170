//! Per-invocation input, working state and report of a release

use crate::core::error::ReleaseError;
use crate::core::state_machine::StageTransition;
use crate::core::traits::PackageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Workflow file watched when none is given
pub const DEFAULT_WORKFLOW: &str = "release.yaml";

/// Artifact name uploaded by the release workflow
pub const DEFAULT_ARTIFACT_NAME: &str = "goreleaser";

/// Set of package kinds selected for publication
///
/// An empty selection selects every kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSelection {
    names: BTreeSet<String>,
}

impl TargetSelection {
    /// Select every kind
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Whether `kind` should be published
    pub fn is_eligible(&self, kind: PackageKind) -> bool {
        self.names.is_empty() || self.names.contains(kind.as_str())
    }

    /// Selected names that match no known kind
    pub fn unknown_names(&self) -> Vec<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| PackageKind::parse(name).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Immutable input of a single pipeline execution
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    version: String,
    run_id: Option<String>,
    workflow: String,
    selection: TargetSelection,
    repository: Option<String>,
    artifact_name: String,
}

impl ReleaseRequest {
    /// Create a request for `version`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the version is empty.
    pub fn new(version: impl Into<String>) -> Result<Self, ReleaseError> {
        let version = version.into().trim().to_string();
        if version.is_empty() {
            return Err(ReleaseError::config("version argument is required"));
        }

        Ok(Self {
            version,
            run_id: None,
            workflow: DEFAULT_WORKFLOW.to_string(),
            selection: TargetSelection::all(),
            repository: None,
            artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
        })
    }

    /// Use an existing CI run instead of tagging; empty means none
    pub fn with_run_id(mut self, run_id: Option<String>) -> Self {
        self.run_id = non_empty(run_id);
        self
    }

    pub fn with_workflow(mut self, workflow: Option<String>) -> Self {
        self.workflow = non_empty(workflow).unwrap_or_else(|| DEFAULT_WORKFLOW.to_string());
        self
    }

    pub fn with_selection(mut self, selection: TargetSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Repository (`owner/name`) the workflow run belongs to
    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = non_empty(repository);
        self
    }

    pub fn with_artifact_name(mut self, artifact_name: Option<String>) -> Self {
        self.artifact_name =
            non_empty(artifact_name).unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string());
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn selection(&self) -> &TargetSelection {
        &self.selection
    }

    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    /// Pre-release versions (containing a hyphen) are tagged but never published
    pub fn is_prerelease(&self) -> bool {
        self.version.contains('-')
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Working state of the orchestrator, built up stage by stage
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    run_id: Option<String>,
    artifact_dir: Option<PathBuf>,
    server_url: String,
}

impl PipelineState {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            run_id: None,
            artifact_dir: None,
            server_url: server_url.into(),
        }
    }

    /// Record the run ID. Write-once.
    pub fn set_run_id(&mut self, run_id: String) {
        debug_assert!(self.run_id.is_none(), "run ID is already known");
        self.run_id = Some(run_id);
    }

    /// Record the artifact directory. Write-once.
    pub fn set_artifact_dir(&mut self, dir: PathBuf) {
        debug_assert!(self.artifact_dir.is_none(), "artifacts were already retrieved");
        self.artifact_dir = Some(dir);
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn artifact_dir(&self) -> Option<&Path> {
        self.artifact_dir.as_deref()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

/// A target that received the new version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedTarget {
    pub kind: PackageKind,
    pub repository: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,
}

/// Summary of a completed pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
    pub published: Vec<PublishedTarget>,
    /// Targets that had nothing to publish, as `kind: reason`
    pub skipped: Vec<String>,
    pub prerelease: bool,
    /// Stages the pipeline went through
    pub stages: Vec<StageTransition>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection_selects_every_kind() {
        let selection = TargetSelection::from_names(Vec::<String>::new());
        for kind in PackageKind::ALL {
            assert!(selection.is_eligible(kind));
        }
    }

    #[test]
    fn test_selection_is_membership() {
        let selection = TargetSelection::from_names(["scoop", "homebrew"]);

        assert!(selection.is_eligible(PackageKind::Homebrew));
        assert!(selection.is_eligible(PackageKind::Scoop));
        assert!(!selection.is_eligible(PackageKind::Winget));
    }

    #[test]
    fn test_selection_is_order_independent() {
        assert_eq!(
            TargetSelection::from_names(["winget", "scoop"]),
            TargetSelection::from_names(["scoop", "winget"])
        );
    }

    #[test]
    fn test_unknown_selection_names() {
        let selection = TargetSelection::from_names(["winget", "chocolatey", " "]);
        assert_eq!(selection.unknown_names(), vec!["chocolatey"]);
    }

    #[test]
    fn test_request_requires_version() {
        let error = ReleaseRequest::new("  ").unwrap_err();
        assert_eq!(error.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_request_defaults() {
        let request = ReleaseRequest::new("v1.2.3")
            .unwrap()
            .with_run_id(Some(String::new()))
            .with_workflow(None);

        assert_eq!(request.version(), "v1.2.3");
        assert_eq!(request.run_id(), None);
        assert_eq!(request.workflow(), DEFAULT_WORKFLOW);
        assert_eq!(request.artifact_name(), DEFAULT_ARTIFACT_NAME);
        assert!(request.selection().is_empty());
    }

    #[test]
    fn test_prerelease_detection() {
        assert!(ReleaseRequest::new("v1.2.3-beta.1").unwrap().is_prerelease());
        assert!(!ReleaseRequest::new("v1.2.3").unwrap().is_prerelease());
    }

    #[test]
    fn test_pipeline_state_builds_up() {
        let mut state = PipelineState::new("https://github.com");
        assert!(state.run_id().is_none());

        state.set_run_id("42".to_string());
        state.set_artifact_dir(PathBuf::from("/tmp/release-publisher-x"));

        assert_eq!(state.run_id(), Some("42"));
        assert_eq!(state.artifact_dir(), Some(Path::new("/tmp/release-publisher-x")));
        assert_eq!(state.server_url(), "https://github.com");
    }
}
