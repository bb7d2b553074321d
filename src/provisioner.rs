use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::creation::is_valid_name;
use crate::error::ProvisionError;
use crate::provider_manager::ProviderManager;
use crate::providers::{Operation, Provider, WorkspaceParams};
use crate::target::{Target, TargetConfig, TargetInfo};
use crate::workspace::Workspace;

pub struct ProvisionerConfig {
    pub provider_manager: Arc<dyn ProviderManager>,
}

/// Routes target and workspace lifecycle calls to the provider named by the
/// target config
///
/// Every call resolves the provider first and then makes exactly one call on
/// it. Nothing is retried and provider results are returned as they are.
#[derive(Clone)]
pub struct Provisioner {
    provider_manager: Arc<dyn ProviderManager>,
}

impl Provisioner {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            provider_manager: config.provider_manager,
        }
    }

    fn provider(&self, target_config: &TargetConfig) -> Result<Arc<dyn Provider>, ProvisionError> {
        self.provider_manager
            .get_provider(&target_config.provider_info.name)
    }

    #[tracing::instrument(skip_all, fields(target = %target.name), err)]
    pub async fn create_target(
        &self,
        target: &Target,
        target_config: &TargetConfig,
    ) -> Result<(), ProvisionError> {
        check_target(target)?;
        let provider = self.provider(target_config)?;

        info!("Creating target");
        provider
            .create_target(target, target_config)
            .await
            .map_err(|e| ProvisionError::execution(Operation::CreateTarget, &target.name, e))
    }

    #[tracing::instrument(skip_all, fields(target = %target.name), err)]
    pub async fn start_target(
        &self,
        target: &Target,
        target_config: &TargetConfig,
    ) -> Result<(), ProvisionError> {
        check_target(target)?;
        let provider = self.provider(target_config)?;

        info!("Starting target");
        provider
            .start_target(target, target_config)
            .await
            .map_err(|e| ProvisionError::execution(Operation::StartTarget, &target.name, e))
    }

    #[tracing::instrument(skip_all, fields(target = %target.name), err)]
    pub async fn stop_target(
        &self,
        target: &Target,
        target_config: &TargetConfig,
    ) -> Result<(), ProvisionError> {
        check_target(target)?;
        let provider = self.provider(target_config)?;

        info!("Stopping target");
        provider
            .stop_target(target, target_config)
            .await
            .map_err(|e| ProvisionError::execution(Operation::StopTarget, &target.name, e))
    }

    /// Queries the provider for the target's status, giving up as soon as
    /// `cancel` fires
    #[tracing::instrument(skip_all, fields(target = %target.name), err)]
    pub async fn get_target_info(
        &self,
        target: &Target,
        target_config: &TargetConfig,
        cancel: &CancellationToken,
    ) -> Result<TargetInfo, ProvisionError> {
        check_target(target)?;
        let provider = self.provider(target_config)?;

        let cancelled = || ProvisionError::Cancelled {
            operation: Operation::GetTargetInfo,
            subject: target.name.clone(),
        };

        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled()),
            info = provider.get_target_info(target, target_config, cancel) => info
                .map_err(|e| ProvisionError::execution(Operation::GetTargetInfo, &target.name, e)),
        }
    }

    #[tracing::instrument(skip_all, fields(target = %target.name), err)]
    pub async fn destroy_target(
        &self,
        target: &Target,
        target_config: &TargetConfig,
    ) -> Result<(), ProvisionError> {
        check_target(target)?;
        let provider = self.provider(target_config)?;

        info!("Destroying target");
        provider
            .destroy_target(target, target_config)
            .await
            .map_err(|e| ProvisionError::execution(Operation::DestroyTarget, &target.name, e))
    }

    #[tracing::instrument(skip_all, fields(workspace = %params.workspace.name), err)]
    pub async fn create_workspace(&self, params: &WorkspaceParams) -> Result<(), ProvisionError> {
        check_params(params)?;
        let provider = self.provider(&params.target_config)?;

        info!("Creating workspace");
        provider.create_workspace(params).await.map_err(|e| {
            ProvisionError::execution(Operation::CreateWorkspace, &params.workspace.name, e)
        })
    }

    #[tracing::instrument(skip_all, fields(workspace = %params.workspace.name), err)]
    pub async fn start_workspace(&self, params: &WorkspaceParams) -> Result<(), ProvisionError> {
        check_params(params)?;
        let provider = self.provider(&params.target_config)?;

        info!("Starting workspace");
        provider.start_workspace(params).await.map_err(|e| {
            ProvisionError::execution(Operation::StartWorkspace, &params.workspace.name, e)
        })
    }

    #[tracing::instrument(skip_all, fields(workspace = %workspace.name), err)]
    pub async fn stop_workspace(
        &self,
        workspace: &Workspace,
        target_config: &TargetConfig,
    ) -> Result<(), ProvisionError> {
        check_workspace(workspace)?;
        let provider = self.provider(target_config)?;

        info!("Stopping workspace");
        provider
            .stop_workspace(workspace, target_config)
            .await
            .map_err(|e| ProvisionError::execution(Operation::StopWorkspace, &workspace.name, e))
    }

    #[tracing::instrument(skip_all, fields(workspace = %workspace.name), err)]
    pub async fn destroy_workspace(
        &self,
        workspace: &Workspace,
        target_config: &TargetConfig,
    ) -> Result<(), ProvisionError> {
        check_workspace(workspace)?;
        let provider = self.provider(target_config)?;

        info!("Destroying workspace");
        provider
            .destroy_workspace(workspace, target_config)
            .await
            .map_err(|e| ProvisionError::execution(Operation::DestroyWorkspace, &workspace.name, e))
    }
}

fn check_target(target: &Target) -> Result<(), ProvisionError> {
    if target.id.is_empty() || target.name.is_empty() {
        return Err(ProvisionError::InvalidArgument(
            "target needs an id and a name".to_string(),
        ));
    }
    if !is_valid_name(&target.id) {
        return Err(ProvisionError::InvalidArgument(format!(
            "target id {:?} is not a plain name",
            target.id
        )));
    }
    Ok(())
}

fn check_workspace(workspace: &Workspace) -> Result<(), ProvisionError> {
    if workspace.name.is_empty() || workspace.target_id.is_empty() {
        return Err(ProvisionError::InvalidArgument(
            "workspace needs a name and a target id".to_string(),
        ));
    }
    if !is_valid_name(&workspace.name) || !is_valid_name(&workspace.target_id) {
        return Err(ProvisionError::InvalidArgument(format!(
            "workspace {:?} of target {:?} is not a plain name",
            workspace.name, workspace.target_id
        )));
    }
    Ok(())
}

fn check_params(params: &WorkspaceParams) -> Result<(), ProvisionError> {
    check_target(&params.target)?;
    check_workspace(&params.workspace)?;
    if params.workspace.target_id != params.target.id {
        return Err(ProvisionError::InvalidArgument(format!(
            "workspace {} does not belong to target {}",
            params.workspace.name, params.target.name
        )));
    }
    Ok(())
}
