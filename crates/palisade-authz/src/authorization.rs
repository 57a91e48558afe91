//! Role-based action authorization compiled from a role snapshot.
//!
//! The compiled view answers "may this identity run this action" against
//! the role definitions it was built from. For trust tokens that is the
//! snapshot frozen at issuance, not the live configuration. Patterns are
//! flattened out of the definitions once at build time.

use std::collections::BTreeMap;

use palisade_core::{RoleDefinition, pattern_matches};

#[derive(Debug)]
struct ScopedGrant {
    scope_patterns: Vec<String>,
    action_patterns: Vec<String>,
}

impl ScopedGrant {
    fn allows(&self, action: &str, scope: &str) -> bool {
        self.scope_patterns.iter().any(|p| pattern_matches(p, scope))
            && self.action_patterns.iter().any(|p| pattern_matches(p, action))
    }
}

/// An action-authorization view restricted to a fixed set of role
/// definitions.
#[derive(Debug)]
pub struct RoleBasedActionAuthorization {
    role_names: Vec<String>,
    cluster_patterns: Vec<String>,
    index_grants: Vec<ScopedGrant>,
    tenant_grants: Vec<ScopedGrant>,
}

impl RoleBasedActionAuthorization {
    /// Compile a view from role definitions.
    pub fn new(role_definitions: &BTreeMap<String, RoleDefinition>) -> Self {
        let mut cluster_patterns = Vec::new();
        let mut index_grants = Vec::new();
        let mut tenant_grants = Vec::new();

        for definition in role_definitions.values() {
            cluster_patterns.extend(definition.cluster_permissions.iter().cloned());
            for grant in &definition.index_permissions {
                index_grants.push(ScopedGrant {
                    scope_patterns: grant.index_patterns.clone(),
                    action_patterns: grant.allowed_actions.clone(),
                });
            }
            for grant in &definition.tenant_permissions {
                tenant_grants.push(ScopedGrant {
                    scope_patterns: grant.tenant_patterns.clone(),
                    action_patterns: grant.allowed_actions.clone(),
                });
            }
        }

        Self {
            role_names: role_definitions.keys().cloned().collect(),
            cluster_patterns,
            index_grants,
            tenant_grants,
        }
    }

    /// The roles this view was compiled from.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.role_names.iter().map(String::as_str)
    }

    /// Whether any compiled role allows a cluster-level action.
    pub fn is_cluster_action_allowed(&self, action: &str) -> bool {
        self.cluster_patterns.iter().any(|p| pattern_matches(p, action))
    }

    /// Whether any compiled role allows an action on an index.
    pub fn is_index_action_allowed(&self, action: &str, index: &str) -> bool {
        self.index_grants.iter().any(|g| g.allows(action, index))
    }

    /// Whether any compiled role allows an action inside a tenant.
    pub fn is_tenant_action_allowed(&self, action: &str, tenant: &str) -> bool {
        self.tenant_grants.iter().any(|g| g.allows(action, tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::RolesConfig;

    fn compiled() -> RoleBasedActionAuthorization {
        let config = RolesConfig::from_yaml(
            r#"
logs_reader:
  index_permissions:
    - index_patterns: ["logs-*"]
      allowed_actions: ["indices:data/read/*"]
ops_admin:
  cluster_permissions: ["cluster:monitor/*"]
  tenant_permissions:
    - tenant_patterns: ["ops"]
      allowed_actions: ["kibana:*"]
"#,
        )
        .unwrap();
        RoleBasedActionAuthorization::new(&config.roles)
    }

    #[test]
    fn test_grants_combine_across_roles() {
        let authz = compiled();
        assert!(authz.is_cluster_action_allowed("cluster:monitor/health"));
        assert!(authz.is_index_action_allowed("indices:data/read/search", "logs-2026.08"));
        assert!(authz.is_tenant_action_allowed("kibana:read", "ops"));
    }

    #[test]
    fn test_unmatched_actions_denied() {
        let authz = compiled();
        assert!(!authz.is_cluster_action_allowed("cluster:admin/settings/update"));
        assert!(!authz.is_index_action_allowed("indices:data/write/index", "logs-2026.08"));
        assert!(!authz.is_index_action_allowed("indices:data/read/search", "secrets"));
        assert!(!authz.is_tenant_action_allowed("kibana:read", "finance"));
    }

    #[test]
    fn test_empty_view_denies_everything() {
        let authz = RoleBasedActionAuthorization::new(&BTreeMap::new());
        assert_eq!(authz.role_names().count(), 0);
        assert!(!authz.is_cluster_action_allowed("cluster:monitor/health"));
    }
}
