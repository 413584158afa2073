//! Configuration loading utilities
//!
//! Provides helper functions for locating and loading the configuration
//! document with environment overrides applied.

use crate::{Result, config::TomlRegistry};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "HTTPWRAPPER_CONFIG";

/// Prefix of `PREFIX_SECTION_KEY` override variables
pub const ENV_PREFIX: &str = "HTTPWRAPPER";

/// Configuration loader with multiple source support
#[derive(Debug)]
pub struct ConfigLoader {
    env_prefix: String,
}

impl ConfigLoader {
    /// Create new configuration loader
    pub fn new() -> Self {
        Self {
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Loader reading overrides from a different variable prefix
    pub fn with_env_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: prefix.into(),
        }
    }

    /// Get the config file path from HTTPWRAPPER_CONFIG or the default location
    ///
    /// Priority:
    /// 1. HTTPWRAPPER_CONFIG environment variable
    /// 2. ~/.config/httpwrapper/config.toml (or platform equivalent)
    pub fn get_config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            if path.exists() {
                debug!("Using config file from {}: {:?}", CONFIG_ENV, path);
                return Some(path);
            } else {
                warn!("{} points to non-existent file: {:?}", CONFIG_ENV, path);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("httpwrapper").join("config.toml");
            if default_path.exists() {
                debug!("Using default config file: {:?}", default_path);
                return Some(default_path);
            }
        }

        debug!("No config file found");
        None
    }

    /// Load configuration with precedence order:
    /// 1. Environment variables
    /// 2. Configuration file
    /// 3. Section defaults (applied when sections are parsed)
    ///
    /// A missing file falls back to defaults; an unreadable or malformed
    /// file is an error.
    pub fn load(&self, config_file: Option<&Path>) -> Result<TomlRegistry> {
        let mut registry = TomlRegistry::empty();

        if let Some(path) = config_file {
            if path.exists() {
                info!("Loading configuration from file: {:?}", path);
                registry = TomlRegistry::from_file(path)?;
            } else {
                warn!("Configuration file not found: {:?}, using defaults", path);
            }
        }

        debug!("Applying environment variable overrides");
        Ok(registry.with_env_overrides(&self.env_prefix))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
