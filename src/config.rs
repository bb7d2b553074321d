use std::path::PathBuf;
use std::sync::OnceLock;

use crate::creation::WorkspaceDefaults;

static CONFIG: OnceLock<Config> = OnceLock::new();

const DEFAULT_IMAGE: &str = "ubuntu:noble";
const DEFAULT_IMAGE_USER: &str = "root";

#[derive(Debug, Clone)]
pub struct Config {
    pub default_image: String,
    pub default_image_user: String,
    /// Directory the local provider keeps its targets in
    pub local_root: PathBuf,
}

impl Config {
    /// Reads the configuration once, loading a `.env` file first if there is one
    pub fn from_env() -> &'static Config {
        CONFIG.get_or_init(|| {
            if let Err(e) = dotenvy::dotenv() {
                tracing::debug!(error = %e, "No .env file loaded");
            }
            Config::from_lookup(|key| std::env::var(key).ok())
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Config {
            default_image: non_empty("RIGGING_DEFAULT_IMAGE")
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            default_image_user: non_empty("RIGGING_DEFAULT_IMAGE_USER")
                .unwrap_or_else(|| DEFAULT_IMAGE_USER.to_string()),
            local_root: non_empty("RIGGING_LOCAL_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("rigging")),
        }
    }

    pub fn workspace_defaults(&self) -> WorkspaceDefaults {
        WorkspaceDefaults {
            image: self.default_image.clone(),
            image_user: self.default_image_user.clone(),
        }
    }
}
