use anyhow::Result;
use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(
    derive(Deserialize, Debug),
    setter(into, strip_option),
    build_fn(error = "anyhow::Error")
)]
#[builder_struct_attr(serde(rename_all = "camelCase"))]
pub struct GitRepository {
    #[builder(default = "self.default_id()?")]
    pub id: String,
    #[builder(field(build = "self.parse_repository_url()?"))]
    pub url: String,
    #[builder(default = "self.path_part(1)?")]
    pub name: String,
    #[builder(default = "self.path_part(0)?")]
    pub owner: String,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    /// Host the repository lives on, i.e. github.com
    #[builder(default = "self.default_source()?")]
    pub source: String,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl GitRepository {
    pub fn from_url(url: impl Into<String>) -> GitRepositoryBuilder {
        GitRepositoryBuilder::default().url(url.into()).to_owned()
    }

    /// The branch to check out, empty when the default branch should be used
    pub fn branch_or_default(&self) -> &str {
        self.branch.as_deref().unwrap_or_default()
    }
}

impl GitRepositoryBuilder {
    fn parsed_url(&self) -> Result<url::Url> {
        let url = self
            .url
            .as_ref()
            .ok_or(anyhow::anyhow!("Expected a repository url"))?;
        let uri = url::Url::parse(url)?;

        if !matches!(uri.scheme(), "https" | "http") {
            return Err(anyhow::anyhow!("Only HTTP(S) URLs are supported"));
        }
        if uri.host_str().is_none() {
            return Err(anyhow::anyhow!("No host found in url {}", uri));
        }
        Ok(uri)
    }

    // Owner and name are the first two path segments, like github.com/<owner>/<name>/tree/<branch>
    fn path_part(&self, index: usize) -> Result<String> {
        let uri = self.parsed_url()?;
        let (owner, name) = uri
            .path_segments()
            .and_then(|segments| segments.take(2).collect_tuple())
            .ok_or(anyhow::anyhow!(
                "Could not extract owner and repository name from {}",
                uri
            ))?;

        let part = if index == 0 { owner } else { name };
        Ok(part.trim_end_matches(".git").to_string())
    }

    fn default_id(&self) -> Result<String> {
        Ok(format!("{}/{}", self.path_part(0)?, self.path_part(1)?))
    }

    fn default_source(&self) -> Result<String> {
        let uri = self.parsed_url()?;
        Ok(uri.host_str().unwrap_or_default().to_string())
    }

    fn parse_repository_url(&self) -> Result<String> {
        let uri = self.parsed_url()?;

        Ok(format!(
            "{}://{}{}",
            uri.scheme(),
            uri.host_str().unwrap_or_default(),
            uri.port().map(|port| format!(":{port}")).unwrap_or_default(),
        ) + uri.path().trim_end_matches('/'))
    }
}
