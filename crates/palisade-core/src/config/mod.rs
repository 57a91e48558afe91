//! Configuration types for the Palisade security layer.
//!
//! Role definitions are loaded from YAML (a single `roles.yaml` map or a
//! directory of per-cluster files) and kept as an ordered name → definition
//! map. The same documents travel inside trust tokens as JSON, so every
//! type here derives both directions of serde.

pub mod role_definition;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use role_definition::RoleDefinition;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// The currently loaded set of role definitions, keyed by role name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolesConfig {
    /// Role name → definition.
    pub roles: BTreeMap<String, RoleDefinition>,
}

impl RolesConfig {
    /// Load role definitions from a YAML file containing a name → definition map.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse role definitions from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load and merge all `*.yaml`/`*.yml` files from a directory.
    ///
    /// Later files win on duplicate role names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut merged = Self::default();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
            {
                let part = Self::from_file(&path)?;
                merged.roles.extend(part.roles);
            }
        }
        Ok(merged)
    }

    /// Get a role definition by name.
    pub fn get(&self, name: &str) -> Option<&RoleDefinition> {
        self.roles.get(name)
    }

    /// Names of all defined roles.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}
