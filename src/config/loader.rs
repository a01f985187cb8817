//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file, and `PROMOTE__*`
//! environment variables, then validates the result before handing it out.

use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::PromoteConfig;
use crate::error::Result;

/// Prefix for environment overrides, e.g. `PROMOTE__BULK__MAX_POLL_ATTEMPTS=10`
pub const ENV_PREFIX: &str = "PROMOTE";

/// Loaded, validated configuration for one orchestration run
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<PromoteConfig>,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from an optional TOML file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&PromoteConfig::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading promote configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: PromoteConfig = builder.build()?.try_deserialize()?;
        Self::from_config(config, path.map(Path::to_path_buf))
    }

    /// Load configuration from a TOML string, without environment overrides
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PromoteConfig = Config::builder()
            .add_source(Config::try_from(&PromoteConfig::default())?)
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Self::from_config(config, None)
    }

    /// Wrap an already-constructed configuration after validating it
    pub fn from_config(config: PromoteConfig, source: Option<PathBuf>) -> Result<Self> {
        config.validate()?;

        info!(
            orchestration_key = %config.orchestration_key,
            worker_name = %config.worker_name,
            batch_capacity = config.batch_capacity,
            publish_enabled = config.publish_enabled,
            "Promote configuration loaded"
        );

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    pub fn config(&self) -> &PromoteConfig {
        &self.config
    }

    /// Shared handle passed to component constructors
    pub fn shared(&self) -> Arc<PromoteConfig> {
        Arc::clone(&self.config)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
