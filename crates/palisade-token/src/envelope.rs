//! Compact encryption envelopes around signed payloads.
//!
//! When an encryption key is configured, issued tokens are five-segment
//! compact envelopes: protected header, empty key segment (direct key
//! agreement), nonce, ciphertext and tag, each base64url-encoded. The
//! protected header doubles as the AEAD associated data, so header
//! tampering (including stripping the producer marker) breaks decryption.
//! A bare signed payload stays a three-segment compact JWS.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use ring::aead;
use serde_json::{Map, Value};

use crate::claims::PRODUCER_VERSION_PARAM;
use crate::error::TokenError;

/// Key agreement of the envelope; the content key is used directly.
pub(crate) const ENVELOPE_ALG: &str = "dir";

/// The single supported content-encryption algorithm.
pub(crate) const CONTENT_ENCRYPTION: &str = "A256GCM";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A parsed encryption envelope.
pub(crate) struct Envelope {
    header: Map<String, Value>,
    header_b64: String,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

/// Whether a compact token string has the five-segment envelope shape.
pub(crate) fn is_envelope(token: &str) -> bool {
    token.split('.').count() == 5
}

impl Envelope {
    /// Parse a five-segment compact envelope.
    pub(crate) fn parse(token: &str) -> Result<Self, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 5 {
            return Err(TokenError::malformed("expected a five-segment envelope"));
        }
        if !segments[1].is_empty() {
            return Err(TokenError::malformed(
                "unsupported key agreement: expected an empty key segment",
            ));
        }

        let header_bytes = decode_segment(segments[0], "envelope header")?;
        let header: Map<String, Value> = serde_json::from_slice(&header_bytes)
            .map_err(|_| TokenError::malformed("envelope header is not a JSON object"))?;

        Ok(Envelope {
            header,
            header_b64: segments[0].to_owned(),
            nonce: decode_segment(segments[2], "envelope nonce")?,
            ciphertext: decode_segment(segments[3], "envelope ciphertext")?,
            tag: decode_segment(segments[4], "envelope tag")?,
        })
    }

    /// The producer marker from the protected header, when present.
    pub(crate) fn producer_version(&self) -> Option<&str> {
        self.header.get(PRODUCER_VERSION_PARAM).and_then(Value::as_str)
    }

    /// The declared content-encryption algorithm.
    pub(crate) fn content_encryption(&self) -> Option<&str> {
        self.header.get("enc").and_then(Value::as_str)
    }

    /// Decrypt the envelope, authenticating the protected header.
    pub(crate) fn open(&self, key: &aead::LessSafeKey) -> Result<Vec<u8>, TokenError> {
        let nonce = aead::Nonce::try_assume_unique_for_key(&self.nonce)
            .map_err(|_| TokenError::decryption_failure("bad nonce length"))?;

        let mut in_out = self.ciphertext.clone();
        in_out.extend_from_slice(&self.tag);
        let plaintext = key
            .open_in_place(nonce, aead::Aad::from(self.header_b64.as_bytes()), &mut in_out)
            .map_err(|_| TokenError::decryption_failure("ciphertext authentication failed"))?;
        Ok(plaintext.to_vec())
    }
}

/// Encrypt a signed payload into a compact envelope.
///
/// `extra_params` lands in the protected header next to `alg` and `enc`;
/// the current producer passes its generation marker here.
pub(crate) fn seal(
    key: &aead::LessSafeKey,
    payload: &[u8],
    extra_params: &[(&str, &str)],
) -> Result<String, TokenError> {
    let mut header = Map::new();
    header.insert("alg".into(), Value::from(ENVELOPE_ALG));
    header.insert("enc".into(), Value::from(CONTENT_ENCRYPTION));
    for (name, value) in extra_params {
        header.insert((*name).into(), Value::from(*value));
    }
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| TokenError::malformed(format!("envelope header serialization: {}", e)))?;
    let header_b64 = URL_SAFE_NO_PAD.encode(header_json);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = payload.to_vec();
    key.seal_in_place_append_tag(nonce, aead::Aad::from(header_b64.as_bytes()), &mut in_out)
        .map_err(|_| TokenError::decryption_failure("content encryption failed"))?;
    let tag_start = in_out.len() - TAG_LEN;

    Ok(format!(
        "{}..{}.{}.{}",
        header_b64,
        URL_SAFE_NO_PAD.encode(nonce_bytes),
        URL_SAFE_NO_PAD.encode(&in_out[..tag_start]),
        URL_SAFE_NO_PAD.encode(&in_out[tag_start..]),
    ))
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::malformed(format!("{} is not valid base64", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::PRODUCER_VERSION_CURRENT;
    use crate::keys::{CryptoSuite, Key};

    fn content_key() -> aead::LessSafeKey {
        let suite = CryptoSuite::build(
            &Key::generate_signing(),
            Some(&Key::generate_encryption()),
        )
        .unwrap();
        suite.encryption.unwrap()
    }

    #[test]
    fn test_shape_detection() {
        assert!(is_envelope("a..b.c.d"));
        assert!(!is_envelope("a.b.c"));
        assert!(!is_envelope("opaque"));
    }

    #[test]
    fn test_seal_open_round_trip() {
        let key = content_key();
        let token = seal(
            &key,
            b"header.payload.signature",
            &[(PRODUCER_VERSION_PARAM, PRODUCER_VERSION_CURRENT)],
        )
        .unwrap();
        assert!(is_envelope(&token));

        let envelope = Envelope::parse(&token).unwrap();
        assert_eq!(envelope.producer_version(), Some(PRODUCER_VERSION_CURRENT));
        assert_eq!(envelope.content_encryption(), Some(CONTENT_ENCRYPTION));
        assert_eq!(envelope.open(&key).unwrap(), b"header.payload.signature");
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let token = seal(&content_key(), b"payload", &[]).unwrap();
        let envelope = Envelope::parse(&token).unwrap();
        let err = envelope.open(&content_key()).unwrap_err();
        assert_eq!(err.kind, crate::error::TokenErrorKind::DecryptionFailure);
    }

    #[test]
    fn test_header_is_authenticated() {
        // Rewriting the protected header (e.g. injecting a producer marker)
        // must break decryption because it is the AEAD associated data.
        let key = content_key();
        let token = seal(&key, b"payload", &[]).unwrap();
        let mut segments: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"alg":"dir","enc":"A256GCM","pv":"2"}"#);
        segments[0] = forged.as_str();
        let forged_token = segments.join(".");

        let envelope = Envelope::parse(&forged_token).unwrap();
        assert!(envelope.open(&key).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Envelope::parse("only.three.parts").is_err());
        assert!(Envelope::parse("!!!..a.b.c").is_err());
        assert!(Envelope::parse("a.key.b.c.d").is_err());
    }
}
