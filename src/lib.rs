pub mod cli;
mod config;
pub mod container_registry;
pub mod creation;
pub mod error;
pub mod git_provider;
pub mod job;
pub mod lifecycle;
pub mod provider_manager;
pub mod providers;
pub mod provisioner;
pub mod repository;
pub mod target;
#[cfg(test)]
mod testing;
pub mod workspace;

pub use config::Config;
pub use error::{CreationError, ProvisionError};
pub use provider_manager::{ProviderManager, ProviderRegistry};
pub use providers::{Provider, WorkspaceParams};
pub use provisioner::{Provisioner, ProvisionerConfig};
pub use target::{Target, TargetConfig, TargetInfo};
pub use workspace::Workspace;

// Loads the global config once
pub fn config() -> &'static config::Config {
    config::Config::from_env()
}
