//! Binding verified tokens into request-scoped authorization contexts.

use std::collections::{BTreeMap, BTreeSet};

use palisade_core::RoleDefinition;
use palisade_token::{TokenError, TrustTokenService, VerifiedToken};

use crate::authorization::RoleBasedActionAuthorization;

/// Authentication domain recorded on identities rebuilt from trust tokens.
pub const TRUST_TOKEN_AUTH_DOMAIN: &str = "trust_token";

/// An authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// The subject name.
    pub name: String,
    /// Which authentication path established this identity.
    pub auth_domain: String,
}

/// A request-scoped view of an identity's privileges, consumed by the
/// per-request authorization pipeline.
pub trait PrivilegesContext {
    /// The authenticated identity.
    fn user(&self) -> &User;

    /// The identity's effective role names.
    fn mapped_roles(&self) -> &BTreeSet<String>;

    /// The action-authorization view to evaluate privileges against.
    fn action_authorization(&self) -> &RoleBasedActionAuthorization;

    /// Whether requests that would normally bypass evaluation as trusted
    /// local calls must still be evaluated for this identity.
    fn requires_privilege_evaluation_for_local_requests(&self) -> bool;
}

/// The authorization context rebuilt from a verified trust token.
///
/// Its action authorization is compiled from the role definitions embedded
/// in the token (the state frozen at issuance), not from the live role
/// configuration.
#[derive(Debug)]
pub struct TokenAuthContext {
    user: User,
    mapped_roles: BTreeSet<String>,
    action_authorization: RoleBasedActionAuthorization,
    role_definitions: BTreeMap<String, RoleDefinition>,
}

impl TokenAuthContext {
    /// Bind a verified token into a request-scoped context.
    pub fn bind(verified: &VerifiedToken) -> Self {
        Self {
            user: User {
                name: verified.subject.clone(),
                auth_domain: TRUST_TOKEN_AUTH_DOMAIN.to_owned(),
            },
            mapped_roles: verified.roles.clone(),
            action_authorization: RoleBasedActionAuthorization::new(&verified.role_definitions),
            role_definitions: verified.role_definitions.clone(),
        }
    }

    /// The role definitions the context is pinned to.
    pub fn role_definitions(&self) -> &BTreeMap<String, RoleDefinition> {
        &self.role_definitions
    }
}

impl PrivilegesContext for TokenAuthContext {
    fn user(&self) -> &User {
        &self.user
    }

    fn mapped_roles(&self) -> &BTreeSet<String> {
        &self.mapped_roles
    }

    fn action_authorization(&self) -> &RoleBasedActionAuthorization {
        &self.action_authorization
    }

    fn requires_privilege_evaluation_for_local_requests(&self) -> bool {
        // This identity did not come through the primary authentication
        // path, so local calls are not pre-trusted.
        true
    }
}

/// Authenticate from the token/audience header pair of an internal call.
///
/// Both headers travel together; if either is absent or empty there is no
/// token to consider and the caller falls through to its primary
/// authentication (`Ok(None)`). A present token that fails verification is
/// a hard error, never an anonymous fallback.
pub fn bind_from_parts(
    service: &TrustTokenService,
    token: Option<&str>,
    audience: Option<&str>,
) -> Result<Option<TokenAuthContext>, TokenError> {
    let (token, audience) = match (token, audience) {
        (Some(token), Some(audience)) if !token.is_empty() && !audience.is_empty() => {
            (token, audience)
        }
        _ => return Ok(None),
    };

    match service.verify(token, Some(audience)) {
        Ok(verified) => Ok(Some(TokenAuthContext::bind(&verified))),
        Err(error) => {
            tracing::warn!(%error, "trust token verification failed");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::{IndexPermissions, RolesConfig};

    fn verified() -> VerifiedToken {
        let definitions = RolesConfig::from_yaml(
            r#"
logs_reader:
  index_permissions:
    - index_patterns: ["logs-*"]
      allowed_actions: ["indices:data/read/*"]
"#,
        )
        .unwrap()
        .roles;

        VerifiedToken {
            subject: "background-job".into(),
            audience: vec!["svc/replication".into()],
            token_id: Some("tok-1".into()),
            roles: definitions.keys().cloned().collect(),
            role_definitions: definitions,
        }
    }

    #[test]
    fn test_bind_builds_pinned_view() {
        let context = TokenAuthContext::bind(&verified());
        assert_eq!(context.user().name, "background-job");
        assert_eq!(context.user().auth_domain, TRUST_TOKEN_AUTH_DOMAIN);
        assert!(context.mapped_roles().contains("logs_reader"));
        assert!(
            context
                .action_authorization()
                .is_index_action_allowed("indices:data/read/search", "logs-2026.08")
        );
        assert_eq!(
            context.role_definitions()["logs_reader"].index_permissions,
            vec![IndexPermissions {
                index_patterns: vec!["logs-*".into()],
                allowed_actions: vec!["indices:data/read/*".into()],
            }]
        );
    }

    #[test]
    fn test_local_requests_still_evaluated() {
        let context = TokenAuthContext::bind(&verified());
        assert!(context.requires_privilege_evaluation_for_local_requests());
    }
}
