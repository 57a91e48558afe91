//! Error types for trust token issuance and verification.

use std::fmt;

/// The kind of a token failure.
///
/// All kinds are terminal: a failed verification is never retried and never
/// falls back to an anonymous-but-authorized context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    /// No signing key is configured; issuance and verification are refused.
    NotConfigured,
    /// The envelope or signature structure could not be parsed.
    Malformed,
    /// The signature does not verify against the configured signing key.
    InvalidSignature,
    /// The encryption envelope could not be decrypted.
    DecryptionFailure,
    /// The expiry claim is not strictly in the future.
    Expired,
    /// The not-before claim is in the future.
    NotYetValid,
    /// The required audience is not in the token's audience list.
    AudienceMismatch,
    /// The token carries no role snapshot claim.
    MissingRoleClaim,
}

impl TokenErrorKind {
    fn describe(self) -> &'static str {
        match self {
            TokenErrorKind::NotConfigured => "trust token service is not configured",
            TokenErrorKind::Malformed => "malformed token",
            TokenErrorKind::InvalidSignature => "invalid token signature",
            TokenErrorKind::DecryptionFailure => "token decryption failed",
            TokenErrorKind::Expired => "token has expired",
            TokenErrorKind::NotYetValid => "token is not yet valid",
            TokenErrorKind::AudienceMismatch => "token audience mismatch",
            TokenErrorKind::MissingRoleClaim => "token carries no role snapshot",
        }
    }
}

/// A token issuance or verification failure.
///
/// Carries the kind, an optional detail message, and the token id claim when
/// the claims were parseable. Key material is never included.
#[derive(Debug, Clone)]
pub struct TokenError {
    /// What went wrong.
    pub kind: TokenErrorKind,
    /// The token id claim, when the claims could be parsed.
    pub token_id: Option<String>,
    message: Option<String>,
}

impl TokenError {
    fn new(kind: TokenErrorKind) -> Self {
        Self {
            kind,
            token_id: None,
            message: None,
        }
    }

    fn with_message(kind: TokenErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            token_id: None,
            message: Some(message.into()),
        }
    }

    /// No signing key is set; the service refuses to operate.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::with_message(TokenErrorKind::NotConfigured, message)
    }

    /// The token structure could not be parsed.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::with_message(TokenErrorKind::Malformed, message)
    }

    /// The signature check failed.
    pub fn invalid_signature() -> Self {
        Self::new(TokenErrorKind::InvalidSignature)
    }

    /// The encryption envelope could not be decrypted.
    pub fn decryption_failure(message: impl Into<String>) -> Self {
        Self::with_message(TokenErrorKind::DecryptionFailure, message)
    }

    /// The expiry claim is at or before the verification time.
    pub fn expired() -> Self {
        Self::new(TokenErrorKind::Expired)
    }

    /// The not-before claim is after the verification time.
    pub fn not_yet_valid() -> Self {
        Self::new(TokenErrorKind::NotYetValid)
    }

    /// The required audience is not in the token's audience list.
    pub fn audience_mismatch(required: &str) -> Self {
        Self::with_message(
            TokenErrorKind::AudienceMismatch,
            format!("required audience '{}' not present", required),
        )
    }

    /// The token has no role snapshot claim.
    pub fn missing_role_claim() -> Self {
        Self::new(TokenErrorKind::MissingRoleClaim)
    }

    /// Attach the token id claim for log correlation.
    pub fn with_token_id(mut self, token_id: Option<String>) -> Self {
        self.token_id = token_id;
        self
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.describe())?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(token_id) = &self.token_id {
            write!(f, " (token id {})", token_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for TokenError {}
