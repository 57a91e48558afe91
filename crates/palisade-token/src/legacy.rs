//! The legacy verification path.
//!
//! Tokens written by the previous crypto stack carry no producer marker on
//! their encryption envelope. They are verified here by a self-contained
//! sequence over `ring` primitives (decrypt, parse, audience, HMAC-SHA512
//! signature, temporal claims), independent of the current path's JOSE
//! library, using the configured keys converted at suite build time. The
//! legacy producer only ever emitted MAC-signed encrypted tokens, so this
//! path has no asymmetric form.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use ring::hmac;
use serde_json::{Map, Value};

use crate::claims::{self, Claims};
use crate::envelope::{self, CONTENT_ENCRYPTION, Envelope};
use crate::error::TokenError;
use crate::keys::CryptoSuite;

const LEGACY_SIGNING_ALG: &str = "HS512";

/// Verify a token written by the legacy producer.
pub(crate) fn verify(
    suite: &CryptoSuite,
    token: &str,
    required_audience: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Claims, TokenError> {
    let engines = suite.legacy.as_ref().ok_or_else(TokenError::invalid_signature)?;

    // Decrypt. Legacy tokens in the wild are always enveloped, but the
    // sequence handles a bare signed payload the way the old stack did.
    let signed = if envelope::is_envelope(token) {
        let parsed = Envelope::parse(token)?;
        if parsed.content_encryption() != Some(CONTENT_ENCRYPTION) {
            return Err(TokenError::decryption_failure(
                "unsupported content encryption",
            ));
        }
        let key = engines
            .content_key
            .as_ref()
            .ok_or_else(|| TokenError::decryption_failure("no encryption key configured"))?;
        String::from_utf8(parsed.open(key)?)
            .map_err(|_| TokenError::malformed("decrypted payload is not UTF-8"))?
    } else {
        token.to_owned()
    };

    // Parse the compact signed payload.
    let segments: Vec<&str> = signed.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::malformed("expected a three-segment signed payload"));
    }
    let header: Map<String, Value> = serde_json::from_slice(&decode_segment(segments[0])?)
        .map_err(|_| TokenError::malformed("signature header is not a JSON object"))?;
    if header.get("alg").and_then(Value::as_str) != Some(LEGACY_SIGNING_ALG) {
        return Err(TokenError::malformed("unsupported signing algorithm"));
    }
    let payload: Map<String, Value> = serde_json::from_slice(&decode_segment(segments[1])?)
        .map_err(|_| TokenError::malformed("claims payload is not a JSON object"))?;
    let parsed = claims::from_legacy(payload)?;

    // The legacy stack checked the audience before the signature.
    if let Some(required) = required_audience
        && !parsed.audience.iter().any(|a| a == required)
    {
        return Err(
            TokenError::audience_mismatch(required).with_token_id(parsed.token_id.clone())
        );
    }

    // Signature.
    let signing_input_len = segments[0].len() + 1 + segments[1].len();
    let signature = decode_segment(segments[2])?;
    hmac::verify(
        &engines.mac_key,
        signed[..signing_input_len].as_bytes(),
        &signature,
    )
    .map_err(|_| TokenError::invalid_signature().with_token_id(parsed.token_id.clone()))?;

    // Temporal claims, zero leeway, expiry strictly in the future.
    if let Some(expiry) = parsed.expiry
        && expiry <= now
    {
        return Err(TokenError::expired().with_token_id(parsed.token_id.clone()));
    }
    if let Some(not_before) = parsed.not_before
        && not_before > now
    {
        return Err(TokenError::not_yet_valid().with_token_id(parsed.token_id.clone()));
    }

    Ok(parsed)
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::malformed("segment is not valid base64"))
}

/// Test-only legacy producer: mints tokens the way the old stack wrote
/// them (HMAC-SHA512 signed, AES-256-GCM enveloped, no producer marker).
#[cfg(test)]
pub(crate) fn mint(
    signing_secret: &[u8],
    encryption_secret: Option<&[u8]>,
    claims: &Claims,
) -> String {
    use ring::aead;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS512","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&Value::Object(claims::to_legacy(claims))).unwrap());
    let signing_input = format!("{}.{}", header, payload);
    let mac_key = hmac::Key::new(hmac::HMAC_SHA512, signing_secret);
    let tag = hmac::sign(&mac_key, signing_input.as_bytes());
    let signed = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(tag.as_ref()));

    match encryption_secret {
        Some(secret) => {
            let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, secret).unwrap();
            let key = aead::LessSafeKey::new(unbound);
            envelope::seal(&key, signed.as_bytes(), &[]).unwrap()
        }
        None => signed,
    }
}
