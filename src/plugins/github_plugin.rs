//! GitHub Plugin - repository metadata over the GitHub REST API

use crate::core::traits::RepositoryMetadata;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Subset of the `GET /repos/{owner}/{repo}` response
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryInfo {
    pub full_name: String,
    pub default_branch: String,
}

/// Repository metadata provider backed by the GitHub REST API
pub struct GitHubRepositoryClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<SecretString>,
}

impl GitHubRepositoryClient {
    /// Create a client for the API at `api_url`
    pub fn new(api_url: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Endpoint of `owner/name`
    pub fn repository_url(&self, owner: &str, name: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, owner, name)
    }

    /// Fetch repository information
    pub async fn get_repository(&self, owner: &str, name: &str) -> anyhow::Result<RepositoryInfo> {
        let mut request = self
            .client
            .get(self.repository_url(owner, name))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, "release-publisher")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "repository {}/{} could not be fetched (HTTP {})",
                owner,
                name,
                response.status()
            );
        }

        Ok(response.json::<RepositoryInfo>().await?)
    }
}

#[async_trait]
impl RepositoryMetadata for GitHubRepositoryClient {
    async fn default_branch(&self, owner: &str, name: &str) -> anyhow::Result<String> {
        Ok(self.get_repository(owner, name).await?.default_branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_url() {
        let client = GitHubRepositoryClient::new("https://ghe.example.com/api/v3/", None);
        assert_eq!(
            client.repository_url("octo", "tool"),
            "https://ghe.example.com/api/v3/repos/octo/tool"
        );
    }

    #[test]
    fn test_repository_info_deserialization() {
        let json = r#"{
            "id": 1,
            "full_name": "microsoft/winget-pkgs",
            "default_branch": "master",
            "private": false
        }"#;
        let info: RepositoryInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.full_name, "microsoft/winget-pkgs");
        assert_eq!(info.default_branch, "master");
    }
}
