//! Configuration file loader for release-publisher
//!
//! This module locates and parses the release configuration and captures the
//! environment the pipeline depends on.

use super::config::ReleaseConfig;
use crate::core::error::ReleaseError;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration file names, in lookup order
const CONFIG_FILENAMES: [&str; 2] = [".goreleaser.yaml", ".goreleaser.yml"];

/// Git hosting origin when `GITHUB_SERVER_URL` is unset
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// REST API origin when `GITHUB_API_URL` is unset
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Environment the pipeline depends on, captured once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEnvironment {
    /// Origin used to build clone URLs
    pub server_url: String,

    /// Origin of the repository metadata API
    pub api_url: String,
}

impl Default for ReleaseEnvironment {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl ReleaseEnvironment {
    /// Capture from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Capture from an explicit variable map
    pub fn from_vars(env: &HashMap<String, String>) -> Self {
        let lookup = |key: &str, default: &str| {
            env.get(key)
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            server_url: lookup("GITHUB_SERVER_URL", DEFAULT_SERVER_URL),
            api_url: lookup("GITHUB_API_URL", DEFAULT_API_URL),
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the configuration
    ///
    /// An explicit path must exist. Otherwise `.goreleaser.yaml` is read from
    /// `base_dir`, falling back to `.goreleaser.yml` only when the first file
    /// does not exist. An empty `project_name` defaults to the name of
    /// `base_dir`.
    pub async fn load(
        explicit: Option<&Path>,
        base_dir: &Path,
    ) -> Result<ReleaseConfig, ReleaseError> {
        let mut config = match explicit {
            Some(path) => Self::load_file(path).await?,
            None => Self::load_default(base_dir).await?,
        };

        if config.project_name.is_empty() {
            config.project_name = Self::project_name_from_dir(base_dir)?;
            debug!(project_name = %config.project_name, "project name derived from directory");
        }

        Ok(config)
    }

    async fn load_default(base_dir: &Path) -> Result<ReleaseConfig, ReleaseError> {
        let [primary, fallback] = CONFIG_FILENAMES;
        match Self::load_file(&base_dir.join(primary)).await {
            Err(ReleaseError::Filesystem { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Self::load_file(&base_dir.join(fallback)).await
            }
            result => result,
        }
    }

    /// Read and parse a single YAML file
    async fn load_file(path: &Path) -> Result<ReleaseConfig, ReleaseError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ReleaseError::filesystem("read a config file", path, e))?;

        let config = Self::parse(&content).map_err(|e| {
            ReleaseError::config(format!(
                "decode {} as YAML: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration YAML
    pub fn parse(content: &str) -> Result<ReleaseConfig, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    fn project_name_from_dir(base_dir: &Path) -> Result<String, ReleaseError> {
        let absolute: PathBuf = std::path::absolute(base_dir)
            .map_err(|e| ReleaseError::filesystem("resolve the project directory", base_dir, e))?;
        absolute
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ReleaseError::config("project_name is not set"))
    }
}
