use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::AuthEntry;
use crate::Error;
use crate::Result;
use crate::StrategyType;

/// Per-client namespace and strategy settings.
///
/// Connecting to the service is up to the [`Coordinator`](crate::Coordinator)
/// handed to the builder.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Namespace root every managed node lives under
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Execution strategy selected when the client is built.
    /// Unknown names fall back to `USUAL`.
    #[serde(default)]
    pub strategy: StrategyType,

    /// Authorities registered with the connection on start
    #[serde(default)]
    pub auths: Vec<AuthEntry>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            strategy: StrategyType::default(),
            auths: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if !crate::utils::path::is_valid_path(&self.root_path) {
            return Err(Error::Config(ConfigError::Message(format!(
                "root_path {:?} must be absolute without empty segments or trailing '/'",
                self.root_path
            ))));
        }

        for auth in &self.auths {
            if auth.scheme.is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "auth scheme must not be empty".to_string(),
                )));
            }
        }

        Ok(())
    }
}

fn default_root_path() -> String {
    "/coord".to_string()
}
