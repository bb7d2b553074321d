//! Assembles the list of workspaces to create from templates and freshly
//! selected repositories
mod assembler;
mod env;
mod names;
mod scripted;

pub use assembler::{assemble_creation_batch, CreationAssembler};
pub use env::{resolve_env_vars, EnvLookup, ProcessEnv};
pub use names::{derive_name, is_valid_name, suggest_unique_name};
pub use scripted::{ScriptedAnswer, ScriptedPrompter};

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CreationError;
use crate::git_provider::GitProviderConfig;
use crate::repository::GitRepository;
use crate::workspace::BuildConfig;

/// Fallback image and user for workspaces that do not bring their own
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDefaults {
    pub image: String,
    pub image_user: String,
}

/// A saved workspace configuration that can be reused across batches
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTemplate {
    pub name: String,
    pub repository_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_config: Option<BuildConfig>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// Where a workspace's source comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum WorkspaceSource {
    Repository { repository: GitRepository },
    Template { name: String, repository: GitRepository },
}

impl WorkspaceSource {
    pub fn repository(&self) -> &GitRepository {
        match self {
            WorkspaceSource::Repository { repository }
            | WorkspaceSource::Template { repository, .. } => repository,
        }
    }

    pub fn into_repository(self) -> GitRepository {
        match self {
            WorkspaceSource::Repository { repository }
            | WorkspaceSource::Template { repository, .. } => repository,
        }
    }

    /// A source without a repository url has nothing to check out, even when
    /// it names a template
    pub fn is_empty(&self) -> bool {
        self.repository().url.is_empty()
    }
}

/// A workspace that is about to be created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreationRequest {
    pub name: String,
    pub source: WorkspaceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_config: Option<BuildConfig>,
    pub image: String,
    pub user: String,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

impl CreationRequest {
    /// Checks that the request can be handed to a provider
    ///
    /// The name becomes a directory name on some providers, so it has to be
    /// a single visible path segment.
    pub fn validate(&self) -> Result<(), CreationError> {
        if self.name.is_empty() {
            return Err(CreationError::Validation(
                "Workspace name must not be empty".to_string(),
            ));
        }
        if !is_valid_name(&self.name) {
            return Err(CreationError::Validation(format!(
                "Workspace name {:?} must not start with a dot or contain path separators",
                self.name
            )));
        }
        if self.source.is_empty() {
            return Err(CreationError::Validation(format!(
                "Workspace {} has no source",
                self.name
            )));
        }
        Ok(())
    }
}

/// What to assemble and which policies apply while doing it
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CreationConfig {
    pub templates: Vec<ProjectTemplate>,
    pub git_providers: Vec<GitProviderConfig>,
    /// Allow typing in a repository url instead of picking one
    pub manual: bool,
    pub skip_branch_selection: bool,
    pub multi_workspace: bool,
    /// Skip the templates and start from a repository
    pub blank_workspace: bool,
    pub defaults: WorkspaceDefaults,
    /// Variables from the active profile, merged under each workspace's own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_env: Option<HashMap<String, String>>,
}

/// Outcome of asking the user for a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateChoice {
    Template(ProjectTemplate),
    /// Start from a repository instead
    Blank,
}

pub struct RepositorySelection<'a> {
    pub git_providers: &'a [GitProviderConfig],
    pub manual: bool,
    pub multi_workspace: bool,
    pub skip_branch_selection: bool,
    /// Position of the workspace in the batch, starting at 1
    pub order: usize,
    /// How often each repository url has been picked in this batch
    pub selected_repos: &'a HashMap<String, usize>,
}

pub struct BranchSelection<'a> {
    pub provider_id: &'a str,
    pub namespace_id: &'a str,
    pub repository: &'a GitRepository,
    pub order: usize,
}

/// The interactive side of workspace creation
///
/// Every method returns `CreationError::AbortedByUser` when the user cancels.
#[async_trait]
pub trait CreationPrompter: Send + Sync {
    async fn select_template(
        &self,
        templates: &[ProjectTemplate],
        order: usize,
    ) -> Result<TemplateChoice, CreationError>;

    async fn select_repository(
        &self,
        selection: RepositorySelection<'_>,
    ) -> Result<GitRepository, CreationError>;

    /// The returned repository carries the chosen branch, if any
    async fn select_branch(
        &self,
        selection: BranchSelection<'_>,
    ) -> Result<GitRepository, CreationError>;

    async fn confirm_more(&self) -> Result<bool, CreationError>;
}
