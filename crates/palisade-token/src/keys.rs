//! Key material and the crypto engine suite built from it.
//!
//! Keys are administratively configured, rotate-able values. Every rotation
//! builds a brand-new immutable [`CryptoSuite`] with all derived engines
//! (current-path signing/verification keys, content-encryption keys and the
//! legacy verifier's converted keys) pre-constructed, so that in-flight
//! issuance and verification always run against one consistent snapshot.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rand::RngCore;
use ring::signature::KeyPair as _;
use ring::{aead, hmac, signature};
use std::fmt;
use std::fs;
use std::path::Path;

/// HMAC-SHA512 signing secrets must carry at least this many bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 64;

/// Content encryption uses AES-256-GCM; secrets are exactly this long.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Errors raised while loading or deriving key material.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid key material: {0}")]
    InvalidMaterial(String),

    #[error("invalid base64 key encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The algorithm family of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Shared secret: signs and verifies (HMAC), or encrypts and decrypts (AES).
    Symmetric,
    /// Ed25519 private key: signs and verifies.
    AsymmetricPrivate,
    /// Ed25519 public key: verifies only.
    AsymmetricPublic,
}

/// A signing or encryption key reference.
///
/// Equality compares material and key id, which is what makes a rotation to
/// an identical key detectable as a no-op.
#[derive(Clone, PartialEq, Eq)]
pub enum Key {
    /// Raw shared secret bytes.
    Symmetric {
        material: Vec<u8>,
        key_id: Option<String>,
    },
    /// Ed25519 private key in PKCS#8 DER form.
    Ed25519Private {
        pkcs8_der: Vec<u8>,
        key_id: Option<String>,
    },
    /// Raw 32-byte Ed25519 public key.
    Ed25519Public {
        raw: Vec<u8>,
        key_id: Option<String>,
    },
}

impl Key {
    /// Generate a random HMAC-SHA512 signing secret.
    pub fn generate_signing() -> Self {
        let mut material = vec![0u8; MIN_SIGNING_KEY_LEN];
        rand::rng().fill_bytes(&mut material);
        Key::Symmetric {
            material,
            key_id: None,
        }
    }

    /// Generate a random AES-256-GCM encryption secret.
    pub fn generate_encryption() -> Self {
        let mut material = vec![0u8; ENCRYPTION_KEY_LEN];
        rand::rng().fill_bytes(&mut material);
        Key::Symmetric {
            material,
            key_id: None,
        }
    }

    /// Generate a fresh Ed25519 signing key.
    pub fn generate_ed25519() -> Result<Self, KeyError> {
        let rng = ring::rand::SystemRandom::new();
        let document = signature::Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| KeyError::InvalidMaterial("Ed25519 key generation failed".into()))?;
        Ok(Key::Ed25519Private {
            pkcs8_der: document.as_ref().to_vec(),
            key_id: None,
        })
    }

    /// Decode an administratively configured shared secret from base64.
    pub fn symmetric_from_base64(encoded: &str) -> Result<Self, KeyError> {
        let material = STANDARD.decode(encoded)?;
        Ok(Key::Symmetric {
            material,
            key_id: None,
        })
    }

    /// Attach a key id.
    pub fn with_key_id(mut self, id: impl Into<String>) -> Self {
        let key_id = match &mut self {
            Key::Symmetric { key_id, .. }
            | Key::Ed25519Private { key_id, .. }
            | Key::Ed25519Public { key_id, .. } => key_id,
        };
        *key_id = Some(id.into());
        self
    }

    /// The key id, if one is set.
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Key::Symmetric { key_id, .. }
            | Key::Ed25519Private { key_id, .. }
            | Key::Ed25519Public { key_id, .. } => key_id.as_deref(),
        }
    }

    /// The algorithm family of this key.
    pub fn family(&self) -> KeyFamily {
        match self {
            Key::Symmetric { .. } => KeyFamily::Symmetric,
            Key::Ed25519Private { .. } => KeyFamily::AsymmetricPrivate,
            Key::Ed25519Public { .. } => KeyFamily::AsymmetricPublic,
        }
    }

    /// The key that verifies what this key signs.
    ///
    /// For a shared secret that is the key itself; for an Ed25519 private
    /// key it is the derived public key. Use this to hand a
    /// verification-only copy to another node.
    pub fn verification_key(&self) -> Result<Key, KeyError> {
        match self {
            Key::Symmetric { .. } | Key::Ed25519Public { .. } => Ok(self.clone()),
            Key::Ed25519Private { pkcs8_der, key_id } => {
                let pair = signature::Ed25519KeyPair::from_pkcs8(pkcs8_der)
                    .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
                Ok(Key::Ed25519Public {
                    raw: pair.public_key().as_ref().to_vec(),
                    key_id: key_id.clone(),
                })
            }
        }
    }

    /// Save a shared secret to a file as base64.
    pub fn save_to_file(&self, path: &Path) -> Result<(), KeyError> {
        match self {
            Key::Symmetric { material, .. } => {
                fs::write(path, STANDARD.encode(material))?;
                Ok(())
            }
            _ => Err(KeyError::InvalidMaterial(
                "only shared secrets are stored as base64 files".into(),
            )),
        }
    }

    /// Load a shared secret from a base64 file.
    pub fn load_from_file(path: &Path) -> Result<Self, KeyError> {
        let encoded = fs::read_to_string(path)?;
        Self::symmetric_from_base64(encoded.trim())
    }
}

impl fmt::Debug for Key {
    // Never print key material.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, len, key_id) = match self {
            Key::Symmetric { material, key_id } => ("Symmetric", material.len(), key_id),
            Key::Ed25519Private { pkcs8_der, key_id } => ("Ed25519Private", pkcs8_der.len(), key_id),
            Key::Ed25519Public { raw, key_id } => ("Ed25519Public", raw.len(), key_id),
        };
        f.debug_struct(name)
            .field("bytes", &len)
            .field("key_id", key_id)
            .finish()
    }
}

/// The engines the legacy sub-verifier runs on, converted from the
/// configured keys at suite build time.
pub(crate) struct LegacyEngines {
    /// HMAC-SHA512 verification key.
    pub(crate) mac_key: hmac::Key,
    /// Content decryption key, when an encryption key is configured.
    pub(crate) content_key: Option<aead::LessSafeKey>,
}

/// An immutable snapshot of every engine derived from the configured keys.
///
/// Built once per rotation and swapped behind a single reference; never
/// mutated in place.
pub(crate) struct CryptoSuite {
    /// Signature algorithm of the current path.
    pub(crate) algorithm: Algorithm,
    /// Present when the signing key can produce signatures.
    pub(crate) signer: Option<EncodingKey>,
    pub(crate) decoding_key: DecodingKey,
    /// Content encryption key of the current path.
    pub(crate) encryption: Option<aead::LessSafeKey>,
    /// Legacy-path engines; only symmetric signing keys have a legacy form.
    pub(crate) legacy: Option<LegacyEngines>,
}

impl CryptoSuite {
    pub(crate) fn build(signing: &Key, encryption: Option<&Key>) -> Result<Self, KeyError> {
        let (algorithm, signer, decoding_key, mac_key) = match signing {
            Key::Symmetric { material, .. } => {
                if material.len() < MIN_SIGNING_KEY_LEN {
                    return Err(KeyError::InvalidLength {
                        expected: MIN_SIGNING_KEY_LEN,
                        actual: material.len(),
                    });
                }
                (
                    Algorithm::HS512,
                    Some(EncodingKey::from_secret(material)),
                    DecodingKey::from_secret(material),
                    Some(hmac::Key::new(hmac::HMAC_SHA512, material)),
                )
            }
            Key::Ed25519Private { pkcs8_der, .. } => {
                let pair = signature::Ed25519KeyPair::from_pkcs8(pkcs8_der)
                    .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
                let public_b64 = URL_SAFE_NO_PAD.encode(pair.public_key().as_ref());
                let decoding_key = DecodingKey::from_ed_components(&public_b64)
                    .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
                (
                    Algorithm::EdDSA,
                    Some(EncodingKey::from_ed_der(pkcs8_der)),
                    decoding_key,
                    None,
                )
            }
            Key::Ed25519Public { raw, .. } => {
                if raw.len() != 32 {
                    return Err(KeyError::InvalidLength {
                        expected: 32,
                        actual: raw.len(),
                    });
                }
                let public_b64 = URL_SAFE_NO_PAD.encode(raw);
                let decoding_key = DecodingKey::from_ed_components(&public_b64)
                    .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
                (Algorithm::EdDSA, None, decoding_key, None)
            }
        };

        let (encryption_engine, legacy_content) = match encryption {
            Some(Key::Symmetric { material, .. }) => {
                if material.len() != ENCRYPTION_KEY_LEN {
                    return Err(KeyError::InvalidLength {
                        expected: ENCRYPTION_KEY_LEN,
                        actual: material.len(),
                    });
                }
                (Some(aead_key(material)?), Some(aead_key(material)?))
            }
            Some(_) => {
                return Err(KeyError::InvalidMaterial(
                    "encryption keys must be shared secrets".into(),
                ));
            }
            None => (None, None),
        };

        let legacy = mac_key.map(|mac_key| LegacyEngines {
            mac_key,
            content_key: legacy_content,
        });

        Ok(CryptoSuite {
            algorithm,
            signer,
            decoding_key,
            encryption: encryption_engine,
            legacy,
        })
    }
}

fn aead_key(material: &[u8]) -> Result<aead::LessSafeKey, KeyError> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, material)
        .map_err(|_| KeyError::InvalidMaterial("AES-256-GCM key rejected".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}
