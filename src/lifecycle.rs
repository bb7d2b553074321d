//! Runs lifecycle operations as jobs and keeps the job on the resource

use std::future::Future;

use tracing::{error, info, warn};

use crate::error::ProvisionError;
use crate::job::{Job, JobAction, ResourceType};
use crate::provisioner::Provisioner;
use crate::providers::WorkspaceParams;
use crate::target::Target;

async fn run_job(
    job: &mut Job,
    operation: impl Future<Output = Result<(), ProvisionError>>,
) -> Result<(), ProvisionError> {
    job.start()?;

    match operation.await {
        Ok(()) => {
            job.succeed()?;
            info!(job = %job.id, action = ?job.action, "Job succeeded");
            Ok(())
        }
        Err(e) => {
            job.fail(e.to_string())?;
            error!(job = %job.id, action = ?job.action, error = %e, "Job failed");
            Err(e)
        }
    }
}

/// Runs `action` against a target and records the job on it
///
/// The job is recorded whether the action succeeds or not. Deleting a target
/// destroys its workspaces first; with `ForceDelete` a workspace that fails to
/// go away does not stop the target from being destroyed.
#[tracing::instrument(skip_all, fields(target = %target.name, action = ?action))]
pub async fn run_target_job(
    provisioner: &Provisioner,
    target: &mut Target,
    action: JobAction,
) -> Result<Job, ProvisionError> {
    let mut job = Job::new(ResourceType::Target, &target.id, action);
    let config = &target.target_config;

    let result = match action {
        JobAction::Create => run_job(&mut job, provisioner.create_target(target, config)).await,
        JobAction::Start => run_job(&mut job, provisioner.start_target(target, config)).await,
        JobAction::Stop => run_job(&mut job, provisioner.stop_target(target, config)).await,
        JobAction::Delete | JobAction::ForceDelete => {
            let force = action == JobAction::ForceDelete;
            run_job(&mut job, delete_target(provisioner, target, force)).await
        }
    };

    if result.is_ok() && matches!(action, JobAction::Delete | JobAction::ForceDelete) {
        target.workspaces.clear();
    }

    target.record_job(job.clone());
    result.map(|()| job)
}

async fn delete_target(
    provisioner: &Provisioner,
    target: &Target,
    force: bool,
) -> Result<(), ProvisionError> {
    for workspace in &target.workspaces {
        match provisioner
            .destroy_workspace(workspace, &target.target_config)
            .await
        {
            Ok(()) => {}
            Err(e) if force => {
                warn!(workspace = %workspace.name, error = %e, "Could not destroy workspace, continuing");
            }
            Err(e) => return Err(e),
        }
    }

    provisioner
        .destroy_target(target, &target.target_config)
        .await
}

/// Runs `action` against the workspace in `params`
#[tracing::instrument(skip_all, fields(workspace = %params.workspace.name, action = ?action))]
pub async fn run_workspace_job(
    provisioner: &Provisioner,
    params: &WorkspaceParams,
    action: JobAction,
) -> Result<Job, ProvisionError> {
    let mut job = Job::new(ResourceType::Workspace, &params.workspace.id, action);
    let workspace = &params.workspace;
    let config = &params.target_config;

    match action {
        JobAction::Create => run_job(&mut job, provisioner.create_workspace(params)).await,
        JobAction::Start => run_job(&mut job, provisioner.start_workspace(params)).await,
        JobAction::Stop => run_job(&mut job, provisioner.stop_workspace(workspace, config)).await,
        JobAction::Delete | JobAction::ForceDelete => {
            run_job(&mut job, provisioner.destroy_workspace(workspace, config)).await
        }
    }?;

    Ok(job)
}
