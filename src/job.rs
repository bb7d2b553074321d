use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Target,
    Workspace,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum JobAction {
    Create,
    Start,
    Stop,
    Delete,
    /// Delete that keeps going when owned resources fail to go away
    ForceDelete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Pending,
    Running,
    Success,
    Error,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Error => "error",
        };
        f.write_str(state)
    }
}

/// The most recent lifecycle operation performed on a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub action: JobAction,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>, action: JobAction) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resource_id: resource_id.into(),
            resource_type,
            action,
            state: JobState::Pending,
            error: None,
        }
    }

    pub fn start(&mut self) -> Result<(), ProvisionError> {
        self.transition(JobState::Running)
    }

    pub fn succeed(&mut self) -> Result<(), ProvisionError> {
        self.transition(JobState::Success)
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), ProvisionError> {
        self.transition(JobState::Error)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, JobState::Success | JobState::Error)
    }

    // Pending -> Running -> Success | Error
    fn transition(&mut self, next: JobState) -> Result<(), ProvisionError> {
        let allowed = matches!(
            (self.state, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Success)
                | (JobState::Running, JobState::Error)
        );

        if !allowed {
            return Err(ProvisionError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }

        tracing::debug!(job = %self.id, from = %self.state, to = %next, "Job transition");
        self.state = next;
        Ok(())
    }
}
