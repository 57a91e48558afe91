//! Role definition types for cluster, index and tenant permissions.
//!
//! A role definition describes what its holders may do: which cluster-level
//! actions they can execute, which actions on which index patterns, and
//! which actions inside which tenants. Patterns use a trailing `*` wildcard
//! (`indices:data/read/*` matches `indices:data/read/search`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::ConfigError;

/// A single role's permission document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Cluster-level action patterns (e.g. "cluster:monitor/*").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_permissions: Vec<String>,

    /// Per-index-pattern action grants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_permissions: Vec<IndexPermissions>,

    /// Per-tenant-pattern action grants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tenant_permissions: Vec<TenantPermissions>,
}

/// Action grants applying to a set of index patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexPermissions {
    /// Index name patterns this grant covers.
    pub index_patterns: Vec<String>,

    /// Action patterns allowed on the matched indices.
    #[serde(default)]
    pub allowed_actions: Vec<String>,
}

/// Action grants applying to a set of tenant patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantPermissions {
    /// Tenant name patterns this grant covers.
    pub tenant_patterns: Vec<String>,

    /// Action patterns allowed inside the matched tenants.
    #[serde(default)]
    pub allowed_actions: Vec<String>,
}

impl RoleDefinition {
    /// Load a role definition from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a role definition from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Check whether this role allows a cluster-level action.
    pub fn allows_cluster_action(&self, action: &str) -> bool {
        self.cluster_permissions
            .iter()
            .any(|p| pattern_matches(p, action))
    }

    /// Check whether this role allows an action on an index.
    pub fn allows_index_action(&self, action: &str, index: &str) -> bool {
        self.index_permissions.iter().any(|grant| {
            grant.index_patterns.iter().any(|p| pattern_matches(p, index))
                && grant.allowed_actions.iter().any(|p| pattern_matches(p, action))
        })
    }

    /// Check whether this role allows an action inside a tenant.
    pub fn allows_tenant_action(&self, action: &str, tenant: &str) -> bool {
        self.tenant_permissions.iter().any(|grant| {
            grant.tenant_patterns.iter().any(|p| pattern_matches(p, tenant))
                && grant.allowed_actions.iter().any(|p| pattern_matches(p, action))
        })
    }
}

/// Match a name against a pattern with an optional trailing `*` wildcard.
///
/// `"*"` matches everything; `"logs-*"` matches any name with the prefix
/// `logs-`; anything else must match exactly.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_role() -> RoleDefinition {
        RoleDefinition {
            description: Some("read-only log access".into()),
            cluster_permissions: vec!["cluster:monitor/*".into()],
            index_permissions: vec![IndexPermissions {
                index_patterns: vec!["logs-*".into()],
                allowed_actions: vec!["indices:data/read/*".into()],
            }],
            tenant_permissions: vec![TenantPermissions {
                tenant_patterns: vec!["ops".into()],
                allowed_actions: vec!["kibana:read".into()],
            }],
        }
    }

    #[test]
    fn test_pattern_matching() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("logs-*", "logs-2026.08"));
        assert!(!pattern_matches("logs-*", "metrics-2026.08"));
        assert!(pattern_matches("indices:data/read/search", "indices:data/read/search"));
        assert!(!pattern_matches("indices:data/read/search", "indices:data/read/scroll"));
    }

    #[test]
    fn test_cluster_action() {
        let role = reader_role();
        assert!(role.allows_cluster_action("cluster:monitor/health"));
        assert!(!role.allows_cluster_action("cluster:admin/settings/update"));
    }

    #[test]
    fn test_index_action() {
        let role = reader_role();
        assert!(role.allows_index_action("indices:data/read/search", "logs-2026.08"));
        assert!(!role.allows_index_action("indices:data/write/index", "logs-2026.08"));
        assert!(!role.allows_index_action("indices:data/read/search", "metrics-2026.08"));
    }

    #[test]
    fn test_tenant_action() {
        let role = reader_role();
        assert!(role.allows_tenant_action("kibana:read", "ops"));
        assert!(!role.allows_tenant_action("kibana:write", "ops"));
        assert!(!role.allows_tenant_action("kibana:read", "finance"));
    }

    #[test]
    fn test_yaml_defaults() {
        let role = RoleDefinition::from_yaml("cluster_permissions: [\"cluster:monitor/*\"]").unwrap();
        assert!(role.description.is_none());
        assert!(role.index_permissions.is_empty());
        assert!(role.tenant_permissions.is_empty());
    }
}
