//! Token verification and the legacy/current dispatch.
//!
//! Verification never guesses the producing stack from the payload: the
//! token is classified from its outer shape and the envelope's protected
//! header before any payload bytes are touched, and each variant has its
//! own verification function. Unencrypted tokens are always treated as
//! current, because the legacy producer only ever emitted encrypted tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Validation, decode};
use std::collections::HashSet;

use crate::claims::{self, Claims};
use crate::envelope::{self, CONTENT_ENCRYPTION, Envelope};
use crate::error::TokenError;
use crate::keys::CryptoSuite;
use crate::legacy;

/// A token classified by producing stack, decided before payload bytes
/// are touched.
pub(crate) enum TokenKind<'a> {
    /// Encrypted, no producer marker on the envelope: written by the
    /// legacy stack and verified entirely by the legacy sub-verifier.
    Legacy(&'a str),
    /// Encryption envelope carrying the current producer marker.
    CurrentEncrypted(Envelope),
    /// Bare signed payload in the current representation.
    CurrentSigned(&'a str),
}

pub(crate) fn classify(token: &str) -> Result<TokenKind<'_>, TokenError> {
    if !envelope::is_envelope(token) {
        return Ok(TokenKind::CurrentSigned(token));
    }
    let parsed = Envelope::parse(token)?;
    if parsed.producer_version().is_none() {
        Ok(TokenKind::Legacy(token))
    } else {
        Ok(TokenKind::CurrentEncrypted(parsed))
    }
}

/// Verify a token against one crypto suite snapshot and return its claims.
pub(crate) fn verify_claims(
    suite: &CryptoSuite,
    token: &str,
    required_audience: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Claims, TokenError> {
    match classify(token)? {
        TokenKind::Legacy(token) => legacy::verify(suite, token, required_audience, now),
        TokenKind::CurrentEncrypted(parsed) => {
            if parsed.content_encryption() != Some(CONTENT_ENCRYPTION) {
                return Err(TokenError::decryption_failure(
                    "unsupported content encryption",
                ));
            }
            let key = suite
                .encryption
                .as_ref()
                .ok_or_else(|| TokenError::decryption_failure("no encryption key configured"))?;
            let payload = parsed.open(key)?;
            let signed = String::from_utf8(payload)
                .map_err(|_| TokenError::malformed("decrypted payload is not UTF-8"))?;
            verify_signed(suite, &signed, required_audience, now)
        }
        TokenKind::CurrentSigned(token) => verify_signed(suite, token, required_audience, now),
    }
}

/// Verify a bare signed payload on the current path.
fn verify_signed(
    suite: &CryptoSuite,
    signed: &str,
    required_audience: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Claims, TokenError> {
    // Temporal and audience checks are done below with zero leeway and a
    // strictly-future expiry; the library only checks the signature.
    let mut validation = Validation::new(suite.algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<claims::WireClaims>(signed, &suite.decoding_key, &validation)
        .map_err(map_decode_error)?;
    let claims = claims::from_current(data.claims)?;

    validate_claims(&claims, required_audience, now)?;
    Ok(claims)
}

/// Validate temporal claims (zero leeway) and the required audience.
pub(crate) fn validate_claims(
    claims: &Claims,
    required_audience: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), TokenError> {
    if let Some(expiry) = claims.expiry
        && expiry <= now
    {
        return Err(TokenError::expired().with_token_id(claims.token_id.clone()));
    }
    if let Some(not_before) = claims.not_before
        && not_before > now
    {
        return Err(TokenError::not_yet_valid().with_token_id(claims.token_id.clone()));
    }
    if let Some(required) = required_audience
        && !claims.audience.iter().any(|a| a == required)
    {
        return Err(
            TokenError::audience_mismatch(required).with_token_id(claims.token_id.clone())
        );
    }
    Ok(())
}

fn map_decode_error(error: jsonwebtoken::errors::Error) -> TokenError {
    match error.kind() {
        ErrorKind::InvalidSignature => TokenError::invalid_signature(),
        _ => TokenError::malformed(error.to_string()),
    }
}
