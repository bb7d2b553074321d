//! Command line entry points of the `rigging` binary

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::container_registry::ContainerRegistry;
use crate::creation::{
    assemble_creation_batch, CreationConfig, CreationRequest, EnvLookup, ProcessEnv,
    ScriptedAnswer, ScriptedPrompter,
};
use crate::error::CreationError;
use crate::git_provider::{GitContextSource, GitProviderConfig, UrlGitContext};
use crate::job::JobAction;
use crate::lifecycle::{run_target_job, run_workspace_job};
use crate::provider_manager::ProviderRegistry;
use crate::providers::WorkspaceParams;
use crate::provisioner::{Provisioner, ProvisionerConfig};
use crate::target::{Target, TargetInfo};
use crate::workspace::Workspace;

#[derive(Parser, Debug)]
#[command(name = "rigging", version, about)]
pub struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assembles workspace creation requests from a scripted batch file
    Assemble { batch: PathBuf },
    /// Creates a target and its workspaces from a manifest, prints the target
    Up { manifest: PathBuf },
    /// Queries a target (as printed by `up`) for its status
    Info {
        target: PathBuf,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Destroys a target (as printed by `up`) and its workspaces
    Down {
        target: PathBuf,
        /// Keep going when a workspace cannot be destroyed
        #[arg(long)]
        force: bool,
    },
    /// Lists the registered providers
    Providers,
}

/// A creation config together with the answers to its prompts
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchFile {
    #[serde(flatten)]
    pub config: CreationConfig,
    #[serde(default)]
    pub answers: Vec<ScriptedAnswer>,
}

/// A target to create along with the workspaces it should get
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub target: Target,
    #[serde(default)]
    pub workspaces: Vec<CreationRequest>,
    #[serde(default)]
    pub git_providers: Vec<GitProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_registry: Option<ContainerRegistry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_image: Option<String>,
}

pub async fn run(opts: Opts) -> Result<()> {
    let config = crate::config();

    match opts.command {
        Command::Assemble { batch } => {
            let batch: BatchFile = read_json(&batch).await?;
            if let Some(requests) = assemble(batch, config, &ProcessEnv).await? {
                print_json(&requests)?;
            }
        }
        Command::Up { manifest } => {
            let manifest: Manifest = read_json(&manifest).await?;
            let target = up(&provisioner(config)?, manifest).await?;
            print_json(&target)?;
        }
        Command::Info { target, timeout } => {
            let target: Target = read_json(&target).await?;
            let cancel = CancellationToken::new();
            cancel_on_interrupt(&cancel, timeout.map(Duration::from_secs));

            let info = provisioner(config)?
                .get_target_info(&target, &target.target_config, &cancel)
                .await?;
            print_json(&info_json(info))?;
        }
        Command::Down { target, force } => {
            let target: Target = read_json(&target).await?;
            let target = down(&provisioner(config)?, target, force).await?;
            print_json(&target)?;
        }
        Command::Providers => {
            let registry = ProviderRegistry::with_builtin_providers(config)?;
            for name in registry.names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn provisioner(config: &Config) -> Result<Provisioner> {
    let registry = ProviderRegistry::with_builtin_providers(config)?;
    Ok(Provisioner::new(ProvisionerConfig {
        provider_manager: Arc::new(registry),
    }))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// Provider metadata is a JSON document itself, print it inline when it parses
fn info_json(info: TargetInfo) -> serde_json::Value {
    let metadata = info.provider_metadata.map(|metadata| {
        serde_json::from_str(&metadata).unwrap_or(serde_json::Value::String(metadata))
    });
    serde_json::json!({ "name": info.name, "providerMetadata": metadata })
}

fn cancel_on_interrupt(cancel: &CancellationToken, timeout: Option<Duration>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });

    if let Some(timeout) = timeout {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(?timeout, "Timed out, cancelling");
            token.cancel();
        });
    }
}

/// Runs a scripted batch, `None` when the script aborts
async fn assemble(
    mut batch: BatchFile,
    config: &Config,
    env: &dyn EnvLookup,
) -> Result<Option<Vec<CreationRequest>>> {
    let defaults = config.workspace_defaults();
    if batch.config.defaults.image.is_empty() {
        batch.config.defaults.image = defaults.image;
    }
    if batch.config.defaults.image_user.is_empty() {
        batch.config.defaults.image_user = defaults.image_user;
    }

    let git = UrlGitContext::new(batch.config.git_providers.clone());
    let prompter = ScriptedPrompter::new(batch.answers);

    match assemble_creation_batch(&batch.config, &git, &prompter, env).await {
        Ok(requests) => Ok(Some(requests)),
        Err(CreationError::AbortedByUser) => {
            info!("Nothing to create, the batch was aborted");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Creates the target and its workspaces
///
/// When a workspace cannot be set up the target is force deleted again, so a
/// failed `up` leaves nothing behind.
async fn up(provisioner: &Provisioner, manifest: Manifest) -> Result<Target> {
    let Manifest {
        mut target,
        workspaces,
        git_providers,
        container_registry,
        builder_image,
    } = manifest;

    for (i, request) in workspaces.iter().enumerate() {
        request.validate()?;
        anyhow::ensure!(
            target.workspace(&request.name).is_none()
                && !workspaces[..i].iter().any(|r| r.name == request.name),
            "Duplicate workspace name {}",
            request.name
        );
    }

    run_target_job(provisioner, &mut target, JobAction::Create).await?;

    let extras = WorkspaceExtras {
        git_providers: &git_providers,
        container_registry: container_registry.as_ref(),
        builder_image: builder_image.as_deref(),
    };
    let result = add_workspaces(provisioner, &mut target, workspaces, &extras).await;
    let Err(e) = result else {
        return Ok(target);
    };

    warn!(target = %target.name, error = %e, "Setting up workspaces failed, removing target");
    if let Err(rollback) = run_target_job(provisioner, &mut target, JobAction::ForceDelete).await {
        return Err(e.context(format!(
            "Target {} ({}) could not be removed again: {rollback}",
            target.name, target.id
        )));
    }
    Err(e)
}

struct WorkspaceExtras<'a> {
    git_providers: &'a [GitProviderConfig],
    container_registry: Option<&'a ContainerRegistry>,
    builder_image: Option<&'a str>,
}

// Workspaces join the target before they are created so a rollback also
// destroys the one that failed halfway
async fn add_workspaces(
    provisioner: &Provisioner,
    target: &mut Target,
    requests: Vec<CreationRequest>,
    extras: &WorkspaceExtras<'_>,
) -> Result<()> {
    let git = UrlGitContext::new(extras.git_providers.to_vec());

    for request in requests {
        let workspace = Workspace::from_request(request, &target.id);
        target.workspaces.push(workspace.clone());
        let provider_id = git.provider_id_for_url(&workspace.repository.url).await?;

        let mut params = WorkspaceParams::builder();
        params
            .target(target.clone())
            .target_config(target.target_config.clone())
            .workspace(workspace);
        if let Some(git_provider) = extras
            .git_providers
            .iter()
            .find(|config| config.id == provider_id)
        {
            params.git_provider_config(git_provider.clone());
        }
        if let Some(registry) = extras.container_registry {
            params.container_registry(registry.clone());
        }
        if let Some(image) = extras.builder_image {
            params.builder_image(image);
        }
        let params = params.build()?;

        run_workspace_job(provisioner, &params, JobAction::Create).await?;
        run_workspace_job(provisioner, &params, JobAction::Start).await?;
    }

    Ok(())
}

async fn down(provisioner: &Provisioner, mut target: Target, force: bool) -> Result<Target> {
    let action = if force {
        JobAction::ForceDelete
    } else {
        JobAction::Delete
    };
    run_target_job(provisioner, &mut target, action).await?;
    Ok(target)
}
