mod local;
pub use local::LocalProvider;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use derive_builder::Builder;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::container_registry::ContainerRegistry;
use crate::git_provider::GitProviderConfig;
use crate::target::{Target, TargetConfig, TargetInfo};
use crate::workspace::Workspace;

/// Everything a provider needs to create or start a workspace
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into, strip_option), build_fn(error = "anyhow::Error"))]
pub struct WorkspaceParams {
    pub target: Target,
    pub target_config: TargetConfig,
    pub workspace: Workspace,
    #[builder(default)]
    pub container_registry: Option<ContainerRegistry>,
    #[builder(default)]
    pub git_provider_config: Option<GitProviderConfig>,
    #[builder(default)]
    pub builder_image: Option<String>,
    #[builder(default)]
    pub builder_image_container_registry: Option<ContainerRegistry>,
}

impl WorkspaceParams {
    pub fn builder() -> WorkspaceParamsBuilder {
        WorkspaceParamsBuilder::default()
    }
}

/// The lifecycle capabilities a backend implements for targets and their workspaces
///
/// Implementors own how compute is actually provisioned; callers go through the
/// `Provisioner`, which picks the provider named by the target config.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    async fn create_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()>;

    async fn start_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()>;

    async fn stop_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()>;

    /// Implementations should give up early once `cancel` fires
    async fn get_target_info(
        &self,
        target: &Target,
        target_config: &TargetConfig,
        cancel: &CancellationToken,
    ) -> Result<TargetInfo>;

    async fn destroy_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()>;

    async fn create_workspace(&self, params: &WorkspaceParams) -> Result<()>;

    async fn start_workspace(&self, params: &WorkspaceParams) -> Result<()>;

    async fn stop_workspace(&self, workspace: &Workspace, target_config: &TargetConfig)
        -> Result<()>;

    async fn destroy_workspace(
        &self,
        workspace: &Workspace,
        target_config: &TargetConfig,
    ) -> Result<()>;
}

/// The lifecycle operations, used to label errors and traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateTarget,
    StartTarget,
    StopTarget,
    GetTargetInfo,
    DestroyTarget,
    CreateWorkspace,
    StartWorkspace,
    StopWorkspace,
    DestroyWorkspace,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::CreateTarget => "create_target",
            Operation::StartTarget => "start_target",
            Operation::StopTarget => "stop_target",
            Operation::GetTargetInfo => "get_target_info",
            Operation::DestroyTarget => "destroy_target",
            Operation::CreateWorkspace => "create_workspace",
            Operation::StartWorkspace => "start_workspace",
            Operation::StopWorkspace => "stop_workspace",
            Operation::DestroyWorkspace => "destroy_workspace",
        };
        f.write_str(name)
    }
}

pub const BUILTIN_PROVIDERS: &[&str] = &["local"];

/// Instantiates one of the providers that ship with this crate
pub fn builtin_provider(name: &str, config: &Config) -> Result<Arc<dyn Provider>> {
    match name {
        "local" => Ok(Arc::new(LocalProvider::new(config.local_root.clone()))),
        _ => Err(anyhow::anyhow!("Unsupported provider: {}", name)),
    }
}
