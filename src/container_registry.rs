use serde::{Deserialize, Serialize};

/// Credentials for pulling images from a container registry
#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRegistry {
    pub server: String,
    pub username: String,
    pub password: String,
}

// Keep the password out of logs and traces
impl std::fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
