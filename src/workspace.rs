use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::creation::CreationRequest;
use crate::repository::GitRepository;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DevcontainerConfig {
    pub file_path: String,
}

/// How the workspace image gets built, empty means automatic detection
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devcontainer: Option<DevcontainerConfig>,
}

/// A single source checkout inside a target
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    /// Unique within the owning target
    pub name: String,
    pub target_id: String,
    pub repository: GitRepository,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_config: Option<BuildConfig>,
    pub image: String,
    pub user: String,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

impl Workspace {
    /// Turns an assembled creation request into a workspace owned by `target_id`
    pub fn from_request(request: CreationRequest, target_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            target_id: target_id.into(),
            repository: request.source.into_repository(),
            build_config: request.build_config,
            image: request.image,
            user: request.user,
            env_vars: request.env_vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creation::WorkspaceSource;

    #[test]
    fn test_from_request() {
        let repository = GitRepository::from_url("https://github.com/bosun-ai/fluyt")
            .branch("main")
            .build()
            .unwrap();
        let request = CreationRequest {
            name: "fluyt2".to_string(),
            source: WorkspaceSource::Template {
                name: "fluyt".to_string(),
                repository: repository.clone(),
            },
            build_config: Some(BuildConfig::default()),
            image: "ubuntu:noble".to_string(),
            user: "root".to_string(),
            env_vars: HashMap::from([("RUST_LOG".to_string(), "debug".to_string())]),
        };

        let workspace = Workspace::from_request(request, "target-1");

        assert_eq!(workspace.name, "fluyt2");
        assert_eq!(workspace.target_id, "target-1");
        assert_eq!(workspace.repository, repository);
        assert_eq!(workspace.env_vars["RUST_LOG"], "debug");
        assert!(!workspace.id.is_empty());
    }
}
