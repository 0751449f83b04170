//! Branch name resolution
//!
//! Branch settings may be literal names or templates containing the version
//! placeholder (`aqua-{{.Version}}`). An empty result falls back to the
//! repository's default branch.

use crate::core::error::ReleaseError;
use crate::core::traits::RepositoryMetadata;
use std::sync::Arc;
use tracing::info;

/// Placeholder spellings substituted with the release version
const VERSION_PLACEHOLDERS: [&str; 2] = ["{{.Version}}", "{{ .Version }}"];

/// Substitute the version placeholder in `template`
///
/// Pure substring replacement; no other variables, no escaping.
pub fn expand_version(template: &str, version: &str) -> String {
    VERSION_PLACEHOLDERS
        .iter()
        .fold(template.to_string(), |acc, placeholder| {
            acc.replace(placeholder, version)
        })
}

/// Resolves branch settings, falling back to remote default branches
#[derive(Clone)]
pub struct BranchResolver {
    metadata: Arc<dyn RepositoryMetadata>,
}

impl BranchResolver {
    pub fn new(metadata: Arc<dyn RepositoryMetadata>) -> Self {
        Self { metadata }
    }

    /// Expand `template` for `version`, or look up the default branch of
    /// `owner/name` when the expansion is empty
    pub async fn resolve(
        &self,
        template: &str,
        version: &str,
        owner: &str,
        name: &str,
    ) -> Result<String, ReleaseError> {
        let branch = expand_version(template, version);
        if !branch.is_empty() {
            return Ok(branch);
        }
        self.default_branch(owner, name).await
    }

    /// Use `branch` as written, or the default branch of `owner/name` when
    /// it is empty. No placeholder is expanded.
    pub async fn literal_or_default(
        &self,
        branch: &str,
        owner: &str,
        name: &str,
    ) -> Result<String, ReleaseError> {
        if !branch.is_empty() {
            return Ok(branch.to_string());
        }
        self.default_branch(owner, name).await
    }

    /// Default branch of `owner/name`
    pub async fn default_branch(&self, owner: &str, name: &str) -> Result<String, ReleaseError> {
        info!(owner, repo = name, "getting default branch");
        let branch = self
            .metadata
            .default_branch(owner, name)
            .await
            .map_err(|source| ReleaseError::Metadata {
                owner: owner.to_string(),
                name: name.to_string(),
                source,
            })?;

        if branch.is_empty() {
            return Err(ReleaseError::Metadata {
                owner: owner.to_string(),
                name: name.to_string(),
                source: anyhow::anyhow!("repository has no default branch"),
            });
        }
        Ok(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::testing::StaticMetadata;

    #[test]
    fn test_expand_compact_placeholder() {
        assert_eq!(expand_version("aqua-{{.Version}}", "v2.0.0"), "aqua-v2.0.0");
    }

    #[test]
    fn test_expand_spaced_placeholder() {
        assert_eq!(expand_version("aqua-{{ .Version }}", "v2.0.0"), "aqua-v2.0.0");
    }

    #[test]
    fn test_expand_literal_is_identity() {
        assert_eq!(expand_version("main", "v2.0.0"), "main");
        assert_eq!(expand_version("", "v2.0.0"), "");
    }

    #[test]
    fn test_expand_does_not_touch_other_variables() {
        assert_eq!(
            expand_version("{{.Tag}}-{{.Version}}", "v1"),
            "{{.Tag}}-v1"
        );
    }

    #[tokio::test]
    async fn test_resolve_empty_template_looks_up_default_branch() {
        let metadata = Arc::new(StaticMetadata::new().with_branch("octo/winget-pkgs", "main"));
        let resolver = BranchResolver::new(metadata.clone());

        let branch = resolver
            .resolve("", "v2.0.0", "octo", "winget-pkgs")
            .await
            .unwrap();

        assert_eq!(branch, "main");
        assert_eq!(metadata.lookups(), vec!["octo/winget-pkgs"]);
    }

    #[tokio::test]
    async fn test_resolve_explicit_branch_skips_lookup() {
        let metadata = Arc::new(StaticMetadata::new());
        let resolver = BranchResolver::new(metadata.clone());

        let branch = resolver
            .resolve("release", "v2.0.0", "octo", "bucket")
            .await
            .unwrap();

        assert_eq!(branch, "release");
        assert!(metadata.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_literal_branch_is_not_expanded() {
        let metadata = Arc::new(StaticMetadata::new().with_branch("octo/bucket", "master"));
        let resolver = BranchResolver::new(metadata.clone());

        let branch = resolver
            .literal_or_default("tap-{{.Version}}", "octo", "bucket")
            .await
            .unwrap();
        assert_eq!(branch, "tap-{{.Version}}");
        assert!(metadata.lookups().is_empty());

        let branch = resolver.literal_or_default("", "octo", "bucket").await.unwrap();
        assert_eq!(branch, "master");
        assert_eq!(metadata.lookups(), vec!["octo/bucket"]);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_metadata_error() {
        let resolver = BranchResolver::new(Arc::new(StaticMetadata::new()));

        let error = resolver
            .resolve("", "v2.0.0", "octo", "missing")
            .await
            .unwrap_err();

        assert_eq!(error.code(), "METADATA_ERROR");
        assert!(error.to_string().contains("octo/missing"));
    }
}
