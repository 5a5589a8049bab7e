//! Configuration management for the coordination client.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`COORD__` prefix)
//! - Section-wise validation
mod client;
mod retry;
pub use client::*;
pub use retry::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Main configuration container for a coordination client
///
/// Combines all section configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ClientSettings {
    /// Namespace and strategy selection
    #[serde(default)]
    pub client: ClientConfig,
    /// Delay policy consumed by the retrying strategies
    #[serde(default)]
    pub retry: DelayRetryPolicy,
}

impl Debug for ClientSettings {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("root_path", &self.client.root_path)
            .field("strategy", &self.client.strategy)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientSettings {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `COORD__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so `with_override_config()` can still be applied.
    /// Callers MUST call `validate()` before using the settings.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("COORD__CLIENT__ROOT_PATH", "/app/shard1");
    /// let settings = ClientSettings::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("COORD")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Applies additional overrides from a file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("COORD")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Validates every section and returns the validated instance.
    ///
    /// # Errors
    /// - Empty server list
    /// - Root path that is not absolute or contains empty segments
    /// - Zero base delay or an upper bound below the base delay
    pub fn validate(self) -> Result<Self> {
        self.client.validate()?;
        self.retry.validate()?;
        Ok(self)
    }
}
