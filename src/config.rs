//! Configuration System
//!
//! Layered configuration for hosts embedding the sync engine and for the
//! `concord` binary. Contract semantics never depend on it: everything here
//! tunes the coordinator, the store location and logging.

use crate::error::ApiError;
use crate::logging::{self, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConcordConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Coordinator tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Exchanges attempted per peer before it is marked degraded
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: u32,

    /// Forward changes received from one peer to the others
    #[serde(default = "default_gossip")]
    pub gossip: bool,
}

fn default_attempt_budget() -> u32 {
    3
}

fn default_gossip() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            attempt_budget: default_attempt_budget(),
            gossip: default_gossip(),
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".concord/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    /// Store path resolved against a workspace root when relative.
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Sync(String),
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Sync(msg) => write!(f, "Sync: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ConcordConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.sync.attempt_budget == 0 {
            errors.push(ValidationError::Sync(
                "attempt_budget must be at least 1".to_string(),
            ));
        }
        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }
        if let Err(e) = logging::validate_config(&self.logging) {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load from `workspace_root` and validate, folding errors into one.
    pub fn load_validated(workspace_root: &Path) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(workspace_root)?;
        config.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
