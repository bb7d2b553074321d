use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;
use crate::job::Job;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    /// Name the provider is registered under
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Selects the provider of a target and carries its provider specific options
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub id: String,
    pub name: String,
    pub provider_info: ProviderInfo,
    /// Provider specific options as a JSON document
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetMetadata {
    pub updated_at: String,
    pub uptime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default: bool,
    pub target_config: TargetConfig,
    pub target_config_id: String,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_job: Option<Job>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TargetMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<String>,
}

impl Target {
    pub fn new(name: impl Into<String>, target_config: TargetConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            target_config_id: target_config.id.clone(),
            target_config,
            ..Default::default()
        }
    }

    pub fn workspace(&self, name: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| w.name == name)
    }

    pub(crate) fn record_job(&mut self, job: Job) {
        self.last_job_id = Some(job.id.clone());
        self.last_job = Some(job);
    }
}

/// Status of a target as reported by its provider
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<String>,
}

/// Marks one target as the default and clears the flag on all others
pub fn set_default_target(targets: &mut [Target], id: &str) -> Result<(), ProvisionError> {
    if !targets.iter().any(|t| t.id == id) {
        return Err(ProvisionError::InvalidArgument(format!(
            "Target not found: {id}"
        )));
    }

    for target in targets.iter_mut() {
        target.default = target.id == id;
    }
    Ok(())
}
