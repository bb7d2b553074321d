use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::repository::GitRepository;

/// A connection to a git provider, as configured by the user
#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitProviderConfig {
    pub id: String,
    /// Kind of provider, i.e. github or gitlab
    pub provider_id: String,
    pub username: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_api_url: Option<String>,
}

impl std::fmt::Debug for GitProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitProviderConfig")
            .field("id", &self.id)
            .field("provider_id", &self.provider_id)
            .field("username", &self.username)
            .field("token", &"***")
            .field("base_api_url", &self.base_api_url)
            .finish()
    }
}

impl GitProviderConfig {
    /// Adds the credentials to an https clone url
    #[tracing::instrument(skip_all)]
    pub fn add_token_to_url(&self, repo_url: &str) -> Result<String> {
        if !repo_url.starts_with("https://") {
            anyhow::bail!("Only https urls are supported")
        }

        let mut parsed = url::Url::parse(repo_url).context("Failed to parse url")?;
        let username = if self.username.is_empty() {
            "x-access-token"
        } else {
            self.username.as_str()
        };

        let result1 = parsed.set_username(username);
        let result2 = parsed.set_password(Some(&self.token));
        if result1.is_err() || result2.is_err() {
            anyhow::bail!("Could not set token on url")
        }

        Ok(parsed.to_string())
    }

    fn host(&self) -> Option<String> {
        let base = self.base_api_url.as_deref()?;
        let host = url::Url::parse(base).ok()?.host_str()?.to_string();
        // api.github.com and friends serve the repositories of the bare host
        Some(host.trim_start_matches("api.").to_string())
    }
}

/// Looks up repository context for urls picked during workspace creation
#[async_trait]
pub trait GitContextSource: Send + Sync {
    /// Normalized repository for a url
    async fn repository_context(&self, url: &str) -> Result<GitRepository>;

    /// Id of the git provider that serves a url
    async fn provider_id_for_url(&self, url: &str) -> Result<String>;
}

const WELL_KNOWN_HOSTS: &[(&str, &str)] = &[
    ("github.com", "github"),
    ("gitlab.com", "gitlab"),
    ("bitbucket.org", "bitbucket"),
    ("codeberg.org", "codeberg"),
];

/// Derives repository context from the url alone, without calling any git provider api
#[derive(Debug, Clone, Default)]
pub struct UrlGitContext {
    git_providers: Vec<GitProviderConfig>,
}

impl UrlGitContext {
    pub fn new(git_providers: Vec<GitProviderConfig>) -> Self {
        Self { git_providers }
    }
}

#[async_trait]
impl GitContextSource for UrlGitContext {
    #[tracing::instrument(skip(self), err)]
    async fn repository_context(&self, url: &str) -> Result<GitRepository> {
        let uri = url::Url::parse(url).context("Failed to parse repository url")?;
        let segments = uri
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut builder = GitRepository::from_url(url);

        // <owner>/<name>/tree/<branch>
        if segments.len() > 3 && segments[2] == "tree" {
            let clone_url = format!(
                "{}://{}/{}/{}",
                uri.scheme(),
                uri.host_str().unwrap_or_default(),
                segments[0],
                segments[1]
            );
            builder = GitRepository::from_url(clone_url);
            builder.branch(segments[3..].join("/"));
        }

        builder.build()
    }

    #[tracing::instrument(skip(self), err)]
    async fn provider_id_for_url(&self, url: &str) -> Result<String> {
        let uri = url::Url::parse(url).context("Failed to parse repository url")?;
        let host = uri
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("No host found in url {}", uri))?;

        if let Some(config) = self
            .git_providers
            .iter()
            .find(|config| config.host().as_deref() == Some(host))
        {
            return Ok(config.id.clone());
        }

        if let Some(config) = WELL_KNOWN_HOSTS
            .iter()
            .find(|(known, _)| *known == host)
            .and_then(|(_, provider_id)| {
                self.git_providers
                    .iter()
                    .find(|config| config.provider_id == *provider_id)
            })
        {
            return Ok(config.id.clone());
        }

        Ok(WELL_KNOWN_HOSTS
            .iter()
            .find(|(known, _)| *known == host)
            .map(|(_, provider_id)| provider_id.to_string())
            .unwrap_or_else(|| host.to_string()))
    }
}
