//! Subject → role-name mapping from configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use palisade_core::ConfigError;
use palisade_token::RoleMapper;

/// A role mapper backed by a static subject → role-names table, loaded
/// from the role-mapping configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigRoleMapper {
    mappings: BTreeMap<String, BTreeSet<String>>,
}

impl ConfigRoleMapper {
    /// Create an empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load mappings from a YAML file (subject → list of role names).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse mappings from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Add a mapping.
    pub fn with_mapping(
        mut self,
        subject: impl Into<String>,
        roles: impl IntoIterator<Item = String>,
    ) -> Self {
        self.mappings.insert(subject.into(), roles.into_iter().collect());
        self
    }
}

impl RoleMapper for ConfigRoleMapper {
    fn mapped_roles(&self, subject: &str) -> BTreeSet<String> {
        self.mappings.get(subject).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml() {
        let mapper = ConfigRoleMapper::from_yaml(
            r#"
background-job:
  - logs_reader
  - snapshot_admin
kibana-server:
  - kibana_user
"#,
        )
        .unwrap();

        assert_eq!(
            mapper.mapped_roles("background-job"),
            BTreeSet::from(["logs_reader".to_string(), "snapshot_admin".to_string()])
        );
        assert!(mapper.mapped_roles("unknown").is_empty());
    }

    #[test]
    fn test_with_mapping() {
        let mapper =
            ConfigRoleMapper::new().with_mapping("job", vec!["logs_reader".to_string()]);
        assert!(mapper.mapped_roles("job").contains("logs_reader"));
    }
}
