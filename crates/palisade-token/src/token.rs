//! Trust token issuance and verification service.
//!
//! One [`TrustTokenService`] per process: it holds the administratively
//! configured key material (rotate-able at runtime), the currently loaded
//! role definitions, and the mapper that computes a subject's effective
//! roles. `issue` embeds the intersection of the subject's mapped roles
//! with the defined roles into the token, so verification on another node
//! can rebuild the authorization state without a configuration read.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::Header;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use palisade_core::RoleDefinition;

use crate::claims::{self, Claims, PRODUCER_VERSION_CURRENT, PRODUCER_VERSION_PARAM};
use crate::envelope;
use crate::error::TokenError;
use crate::keys::{CryptoSuite, Key, KeyError};
use crate::verifier;

/// Fixed negative skew applied to the not-before claim at issuance, so a
/// token is immediately valid on nodes whose clocks run behind the issuer.
pub const NOT_BEFORE_SKEW_SECS: i64 = 30;

/// Computes the externally mapped role names of a subject.
///
/// Implemented by the authorization layer; the service only intersects the
/// result with the currently defined roles.
pub trait RoleMapper: Send + Sync {
    /// The role names mapped to `subject`.
    fn mapped_roles(&self, subject: &str) -> BTreeSet<String>;
}

/// A successfully verified trust token.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// The subject the token was issued for.
    pub subject: String,
    /// Audiences the token is scoped to.
    pub audience: Vec<String>,
    /// Token id for log correlation.
    pub token_id: Option<String>,
    /// Role names from the embedded snapshot.
    pub roles: BTreeSet<String>,
    /// The role definitions frozen at issuance time.
    pub role_definitions: BTreeMap<String, RoleDefinition>,
}

impl VerifiedToken {
    fn from_claims(claims: Claims) -> Result<Self, TokenError> {
        let token_id = claims.token_id;
        let snapshot = claims
            .role_snapshot
            .ok_or_else(|| TokenError::missing_role_claim().with_token_id(token_id.clone()))?;

        let mut role_definitions = BTreeMap::new();
        for (name, value) in snapshot {
            let definition: RoleDefinition = serde_json::from_value(value).map_err(|_| {
                TokenError::malformed(format!(
                    "role snapshot entry '{}' is not a role definition",
                    name
                ))
                .with_token_id(token_id.clone())
            })?;
            role_definitions.insert(name, definition);
        }

        let subject = claims.subject.ok_or_else(|| {
            TokenError::malformed("missing subject claim").with_token_id(token_id.clone())
        })?;
        let roles = role_definitions.keys().cloned().collect();

        Ok(VerifiedToken {
            subject,
            audience: claims.audience,
            token_id,
            roles,
            role_definitions,
        })
    }
}

struct KeyState {
    signing: Option<Key>,
    encryption: Option<Key>,
    suite: Option<Arc<CryptoSuite>>,
}

/// Issues and verifies internal trust tokens.
pub struct TrustTokenService {
    role_mapper: Arc<dyn RoleMapper>,
    roles: RwLock<Arc<BTreeMap<String, RoleDefinition>>>,
    keys: RwLock<KeyState>,
}

impl TrustTokenService {
    /// Create a service with no keys and no role definitions loaded.
    pub fn new(role_mapper: Arc<dyn RoleMapper>) -> Self {
        Self {
            role_mapper,
            roles: RwLock::new(Arc::new(BTreeMap::new())),
            keys: RwLock::new(KeyState {
                signing: None,
                encryption: None,
                suite: None,
            }),
        }
    }

    /// Replace the loaded role definitions.
    ///
    /// Called whenever the role configuration changes; only affects tokens
    /// issued afterwards.
    pub fn update_role_definitions(&self, roles: BTreeMap<String, RoleDefinition>) {
        tracing::debug!(count = roles.len(), "loaded role definitions");
        *self.roles.write().expect("role definitions lock poisoned") = Arc::new(roles);
    }

    /// Set or clear the signing key.
    ///
    /// Setting a key equal to the current one is a no-op. Otherwise every
    /// derived engine is rebuilt into a fresh suite and swapped in before
    /// this returns; concurrent calls keep running on the suite they
    /// already snapshotted.
    pub fn set_signing_key(&self, key: Option<Key>) -> Result<(), KeyError> {
        let mut state = self.keys.write().expect("key state lock poisoned");
        if state.signing == key {
            return Ok(());
        }
        let suite = build_suite(key.as_ref(), state.encryption.as_ref())?;
        tracing::info!(
            key_id = ?key.as_ref().and_then(|k| k.key_id()),
            "updating trust token signing key"
        );
        state.signing = key;
        state.suite = suite;
        Ok(())
    }

    /// Set or clear the encryption key.
    ///
    /// Same no-op and rebuild semantics as [`set_signing_key`].
    ///
    /// [`set_signing_key`]: Self::set_signing_key
    pub fn set_encryption_key(&self, key: Option<Key>) -> Result<(), KeyError> {
        let mut state = self.keys.write().expect("key state lock poisoned");
        if state.encryption == key {
            return Ok(());
        }
        let suite = build_suite(state.signing.as_ref(), key.as_ref())?;
        tracing::info!(
            key_id = ?key.as_ref().and_then(|k| k.key_id()),
            "updating trust token encryption key"
        );
        state.encryption = key;
        state.suite = suite;
        Ok(())
    }

    /// Set both keys with a single suite rebuild.
    pub fn set_keys(&self, signing: Option<Key>, encryption: Option<Key>) -> Result<(), KeyError> {
        let mut state = self.keys.write().expect("key state lock poisoned");
        if state.signing == signing && state.encryption == encryption {
            return Ok(());
        }
        let suite = build_suite(signing.as_ref(), encryption.as_ref())?;
        tracing::info!("updating trust token keys");
        state.signing = signing;
        state.encryption = encryption;
        state.suite = suite;
        Ok(())
    }

    /// The currently configured signing key.
    pub fn current_signing_key(&self) -> Option<Key> {
        self.keys.read().expect("key state lock poisoned").signing.clone()
    }

    /// The currently configured encryption key.
    pub fn current_encryption_key(&self) -> Option<Key> {
        self.keys
            .read()
            .expect("key state lock poisoned")
            .encryption
            .clone()
    }

    /// Issue a trust token for `subject`, scoped to `audience`.
    ///
    /// The token embeds the subject's mapped roles intersected with the
    /// currently defined roles, becomes valid 30 seconds in the past to
    /// absorb clock drift, and expires after `validity` (never, if `None`).
    /// Fails with `NotConfigured` when no signing-capable key is set.
    pub fn issue(
        &self,
        subject: &str,
        audience: &str,
        validity: Option<Duration>,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, audience, validity, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        subject: &str,
        audience: &str,
        validity: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let suite = self
            .suite()
            .ok_or_else(|| TokenError::not_configured("no signing key is set"))?;
        let signer = suite.signer.as_ref().ok_or_else(|| {
            TokenError::not_configured("the configured signing key cannot produce signatures")
        })?;

        let claims = Claims {
            subject: Some(subject.to_owned()),
            audience: vec![audience.to_owned()],
            expiry: validity.map(|v| now + v),
            not_before: Some(now - Duration::seconds(NOT_BEFORE_SKEW_SECS)),
            issued_at: Some(now),
            token_id: Some(Uuid::new_v4().to_string()),
            role_snapshot: Some(self.role_snapshot(subject)),
            producer_version: Some(PRODUCER_VERSION_CURRENT.into()),
            custom: Map::new(),
        };

        let wire = claims::to_current(&claims);
        let signed = jsonwebtoken::encode(&Header::new(suite.algorithm), &wire, signer)
            .map_err(|e| TokenError::not_configured(format!("signing failed: {}", e)))?;

        match &suite.encryption {
            Some(key) => envelope::seal(
                key,
                signed.as_bytes(),
                &[(PRODUCER_VERSION_PARAM, PRODUCER_VERSION_CURRENT)],
            ),
            None => Ok(signed),
        }
    }

    /// Verify a trust token and return its identity and role snapshot.
    ///
    /// When `required_audience` is given, the token's audience list must
    /// contain it. Every failure is terminal; callers must not fall back
    /// to an anonymous-but-authorized context.
    pub fn verify(
        &self,
        token: &str,
        required_audience: Option<&str>,
    ) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, required_audience, Utc::now())
    }

    pub(crate) fn verify_at(
        &self,
        token: &str,
        required_audience: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VerifiedToken, TokenError> {
        let suite = self
            .suite()
            .ok_or_else(|| TokenError::not_configured("no signing key is set"))?;
        let claims = verifier::verify_claims(&suite, token, required_audience, now)?;
        VerifiedToken::from_claims(claims)
    }

    /// Mapped roles intersected with the defined roles, as embeddable JSON.
    fn role_snapshot(&self, subject: &str) -> Map<String, Value> {
        let defined = self
            .roles
            .read()
            .expect("role definitions lock poisoned")
            .clone();
        let mut snapshot = Map::new();
        for name in self.role_mapper.mapped_roles(subject) {
            if let Some(definition) = defined.get(&name)
                && let Ok(value) = serde_json::to_value(definition)
            {
                snapshot.insert(name, value);
            }
        }
        snapshot
    }

    fn suite(&self) -> Option<Arc<CryptoSuite>> {
        self.keys.read().expect("key state lock poisoned").suite.clone()
    }
}

fn build_suite(
    signing: Option<&Key>,
    encryption: Option<&Key>,
) -> Result<Option<Arc<CryptoSuite>>, KeyError> {
    match signing {
        Some(signing) => Ok(Some(Arc::new(CryptoSuite::build(signing, encryption)?))),
        None => Ok(None),
    }
}
