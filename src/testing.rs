//! Test doubles shared by the unit tests

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::providers::{Operation, Provider, WorkspaceParams};
use crate::target::{Target, TargetConfig, TargetInfo};
use crate::workspace::Workspace;

/// A call received by the `RecordingProvider`, with the arguments it got
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Target {
        operation: Operation,
        target: Target,
        target_config: TargetConfig,
    },
    TargetInfo {
        target: Target,
        target_config: TargetConfig,
        cancelled: bool,
    },
    WorkspaceParams {
        operation: Operation,
        params: WorkspaceParams,
    },
    Workspace {
        operation: Operation,
        workspace: Workspace,
        target_config: TargetConfig,
    },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Target { operation, .. }
            | Call::WorkspaceParams { operation, .. }
            | Call::Workspace { operation, .. } => *operation,
            Call::TargetInfo { .. } => Operation::GetTargetInfo,
        }
    }
}

/// Records every call and optionally fails the ones listed in `failing`
#[derive(Debug, Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<Call>>,
    failing: Vec<(Operation, String)>,
    info: Option<TargetInfo>,
    /// Makes `get_target_info` wait until it is cancelled
    hang_on_info: bool,
}

impl RecordingProvider {
    pub fn failing(operation: Operation, message: &str) -> Self {
        Self {
            failing: vec![(operation, message.to_string())],
            ..Default::default()
        }
    }

    pub fn with_info(info: TargetInfo) -> Self {
        Self {
            info: Some(info),
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang_on_info: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls().iter().map(Call::operation).collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        let operation = call.operation();
        self.calls.lock().unwrap().push(call);

        match self.failing.iter().find(|(op, _)| *op == operation) {
            Some((_, message)) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    fn target_call(&self, operation: Operation, target: &Target, target_config: &TargetConfig) -> Result<()> {
        self.record(Call::Target {
            operation,
            target: target.clone(),
            target_config: target_config.clone(),
        })
    }

    fn workspace_call(
        &self,
        operation: Operation,
        workspace: &Workspace,
        target_config: &TargetConfig,
    ) -> Result<()> {
        self.record(Call::Workspace {
            operation,
            workspace: workspace.clone(),
            target_config: target_config.clone(),
        })
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    async fn create_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()> {
        self.target_call(Operation::CreateTarget, target, target_config)
    }

    async fn start_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()> {
        self.target_call(Operation::StartTarget, target, target_config)
    }

    async fn stop_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()> {
        self.target_call(Operation::StopTarget, target, target_config)
    }

    async fn get_target_info(
        &self,
        target: &Target,
        target_config: &TargetConfig,
        cancel: &CancellationToken,
    ) -> Result<TargetInfo> {
        if self.hang_on_info {
            cancel.cancelled().await;
        }

        self.record(Call::TargetInfo {
            target: target.clone(),
            target_config: target_config.clone(),
            cancelled: cancel.is_cancelled(),
        })?;

        Ok(self.info.clone().unwrap_or_else(|| TargetInfo {
            name: target.name.clone(),
            provider_metadata: None,
        }))
    }

    async fn destroy_target(&self, target: &Target, target_config: &TargetConfig) -> Result<()> {
        self.target_call(Operation::DestroyTarget, target, target_config)
    }

    async fn create_workspace(&self, params: &WorkspaceParams) -> Result<()> {
        self.record(Call::WorkspaceParams {
            operation: Operation::CreateWorkspace,
            params: params.clone(),
        })
    }

    async fn start_workspace(&self, params: &WorkspaceParams) -> Result<()> {
        self.record(Call::WorkspaceParams {
            operation: Operation::StartWorkspace,
            params: params.clone(),
        })
    }

    async fn stop_workspace(&self, workspace: &Workspace, target_config: &TargetConfig) -> Result<()> {
        self.workspace_call(Operation::StopWorkspace, workspace, target_config)
    }

    async fn destroy_workspace(
        &self,
        workspace: &Workspace,
        target_config: &TargetConfig,
    ) -> Result<()> {
        self.workspace_call(Operation::DestroyWorkspace, workspace, target_config)
    }
}
