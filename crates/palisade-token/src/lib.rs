//! # palisade-token
//!
//! Internal trust tokens for the Palisade security layer.
//!
//! A trust token is a compact, self-contained credential that one node
//! hands to another (or that a background job keeps across restarts) to
//! re-establish "who is asking, with which pre-approved roles" without a
//! round-trip to the central authorization store. Tokens are always
//! signed, optionally encrypted, and embed a snapshot of the subject's
//! effective role definitions frozen at issuance time.
//!
//! ## Token forms
//!
//! | Form | Segments | Written by |
//! |------|----------|------------|
//! | Signed payload | 3 (compact JWS, HS512 or EdDSA) | current producer, no encryption key |
//! | Encryption envelope | 5 (AES-256-GCM over the signed payload) | current producer, marker in header |
//! | Legacy envelope | 5, no producer marker | previous crypto stack |
//!
//! Verification dispatches on the envelope header before touching payload
//! bytes: marked envelopes and bare payloads take the current path,
//! unmarked envelopes go to the self-contained legacy verifier. This keeps
//! tokens from before the crypto-library migration verifiable until they
//! age out.
//!
//! ## Keys
//!
//! Signing and encryption keys are process-wide mutable state. A rotation
//! builds a complete new engine suite and swaps it atomically; in-flight
//! operations finish on the suite they started with.

pub mod claims;
mod envelope;
pub mod error;
pub mod keys;
mod legacy;
pub mod token;
mod verifier;

pub use claims::{Claims, PRODUCER_VERSION_CURRENT, PRODUCER_VERSION_PARAM, ROLES_CLAIM};
pub use error::{TokenError, TokenErrorKind};
pub use keys::{Key, KeyError, KeyFamily};
pub use token::{NOT_BEFORE_SKEW_SECS, RoleMapper, TrustTokenService, VerifiedToken};
