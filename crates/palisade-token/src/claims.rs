//! Token claims and the two wire representations.
//!
//! The neutral [`Claims`] model converts to and from the current wire
//! representation (a strict serde struct, written by all new tokens) and the
//! legacy wire representation (a lenient JSON map, read-only except in
//! tests). The codec exists to bridge a crypto-library migration: reserved
//! fields convert field by field, everything else passes through verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TokenError;

/// Claim carrying the embedded role snapshot.
pub const ROLES_CLAIM: &str = "roles";

/// Claim and envelope header parameter marking the producer generation.
/// Absent on tokens written by the legacy producer.
pub const PRODUCER_VERSION_PARAM: &str = "pv";

/// Producer generation written by this crate.
pub const PRODUCER_VERSION_CURRENT: &str = "2";

const RESERVED_CLAIMS: &[&str] = &[
    "sub",
    "aud",
    "exp",
    "nbf",
    "iat",
    "jti",
    ROLES_CLAIM,
    PRODUCER_VERSION_PARAM,
];

/// The neutral claim set of a trust token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    /// The authenticated subject the token was issued for.
    pub subject: Option<String>,

    /// Audiences the token is scoped to.
    pub audience: Vec<String>,

    /// Expiry instant, seconds resolution. Absent means no expiry.
    pub expiry: Option<DateTime<Utc>>,

    /// Not-before instant, seconds resolution.
    pub not_before: Option<DateTime<Utc>>,

    /// Issuance instant, seconds resolution. Informative only.
    pub issued_at: Option<DateTime<Utc>>,

    /// Opaque token id for log correlation.
    pub token_id: Option<String>,

    /// Role name → role definition document, frozen at issuance.
    pub role_snapshot: Option<Map<String, Value>>,

    /// Producer generation marker; `None` on legacy tokens.
    pub producer_version: Option<String>,

    /// Unrecognized claims, passed through verbatim.
    pub custom: Map<String, Value>,
}

/// The current wire representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<String>,

    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

/// Convert the neutral model into the current wire representation.
pub fn to_current(claims: &Claims) -> WireClaims {
    WireClaims {
        sub: claims.subject.clone(),
        aud: claims.audience.clone(),
        exp: claims.expiry.map(|t| t.timestamp()),
        nbf: claims.not_before.map(|t| t.timestamp()),
        iat: claims.issued_at.map(|t| t.timestamp()),
        jti: claims.token_id.clone(),
        roles: claims.role_snapshot.clone(),
        pv: claims.producer_version.clone(),
        custom: claims.custom.clone(),
    }
}

/// Convert the current wire representation into the neutral model.
pub fn from_current(wire: WireClaims) -> Result<Claims, TokenError> {
    Ok(Claims {
        subject: wire.sub,
        audience: wire.aud,
        expiry: wire.exp.map(instant).transpose()?,
        not_before: wire.nbf.map(instant).transpose()?,
        issued_at: wire.iat.map(instant).transpose()?,
        token_id: wire.jti,
        role_snapshot: wire.roles,
        producer_version: wire.pv,
        custom: wire.custom,
    })
}

/// Decode the legacy wire representation.
///
/// The legacy stack wrote claims as a loose JSON object: `aud` may be a
/// single string or a list, timestamps are plain integers, and any claim
/// that is not reserved passes through untouched.
pub fn from_legacy(map: Map<String, Value>) -> Result<Claims, TokenError> {
    let mut claims = Claims::default();
    for (name, value) in map {
        match name.as_str() {
            "sub" => claims.subject = value.as_str().map(str::to_owned),
            "aud" => claims.audience = audiences(&value),
            "exp" => claims.expiry = Some(legacy_instant(&value)?),
            "nbf" => claims.not_before = Some(legacy_instant(&value)?),
            "iat" => claims.issued_at = Some(legacy_instant(&value)?),
            "jti" => claims.token_id = value.as_str().map(str::to_owned),
            ROLES_CLAIM => claims.role_snapshot = value.as_object().cloned(),
            PRODUCER_VERSION_PARAM => {
                claims.producer_version = value.as_str().map(str::to_owned)
            }
            _ => {
                claims.custom.insert(name, value);
            }
        }
    }
    Ok(claims)
}

/// Encode the neutral model as a legacy wire map.
///
/// Production code never writes this representation; it exists for the
/// reserved-field round-trip guarantee and for interoperability tests.
pub fn to_legacy(claims: &Claims) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(subject) = &claims.subject {
        map.insert("sub".into(), Value::from(subject.clone()));
    }
    if !claims.audience.is_empty() {
        map.insert("aud".into(), Value::from(claims.audience.clone()));
    }
    if let Some(expiry) = claims.expiry {
        map.insert("exp".into(), Value::from(expiry.timestamp()));
    }
    if let Some(not_before) = claims.not_before {
        map.insert("nbf".into(), Value::from(not_before.timestamp()));
    }
    if let Some(issued_at) = claims.issued_at {
        map.insert("iat".into(), Value::from(issued_at.timestamp()));
    }
    if let Some(token_id) = &claims.token_id {
        map.insert("jti".into(), Value::from(token_id.clone()));
    }
    if let Some(snapshot) = &claims.role_snapshot {
        map.insert(ROLES_CLAIM.into(), Value::Object(snapshot.clone()));
    }
    if let Some(version) = &claims.producer_version {
        map.insert(PRODUCER_VERSION_PARAM.into(), Value::from(version.clone()));
    }
    for (name, value) in &claims.custom {
        if !RESERVED_CLAIMS.contains(&name.as_str()) {
            map.insert(name.clone(), value.clone());
        }
    }
    map
}

fn audiences(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

fn legacy_instant(value: &Value) -> Result<DateTime<Utc>, TokenError> {
    let seconds = value
        .as_i64()
        .ok_or_else(|| TokenError::malformed("timestamp claim is not an integer"))?;
    instant(seconds)
}

fn instant(seconds: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| TokenError::malformed("timestamp claim out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_claims() -> Claims {
        let mut custom = Map::new();
        custom.insert("origin_node".into(), json!("node-3"));
        let mut snapshot = Map::new();
        snapshot.insert("logs_reader".into(), json!({"cluster_permissions": []}));

        Claims {
            subject: Some("background-job".into()),
            audience: vec!["svc/replication".into(), "svc/snapshots".into()],
            expiry: DateTime::from_timestamp(1_900_000_000, 0),
            not_before: DateTime::from_timestamp(1_800_000_000, 0),
            issued_at: DateTime::from_timestamp(1_800_000_030, 0),
            token_id: Some("tok-42".into()),
            role_snapshot: Some(snapshot),
            producer_version: Some(PRODUCER_VERSION_CURRENT.into()),
            custom,
        }
    }

    #[test]
    fn test_current_round_trip() {
        let claims = sample_claims();
        let back = from_current(to_current(&claims)).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_current_to_legacy_to_current() {
        // Reserved fields must survive the migration bridge losslessly.
        let claims = sample_claims();
        let back = from_legacy(to_legacy(&claims)).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_legacy_accepts_string_audience() {
        let mut map = Map::new();
        map.insert("aud".into(), json!("svc/replication"));
        let claims = from_legacy(map).unwrap();
        assert_eq!(claims.audience, vec!["svc/replication".to_string()]);
    }

    #[test]
    fn test_legacy_passes_unknown_claims_through() {
        let mut map = Map::new();
        map.insert("sub".into(), json!("u"));
        map.insert("shard_hint".into(), json!(7));
        let claims = from_legacy(map).unwrap();
        assert_eq!(claims.custom.get("shard_hint"), Some(&json!(7)));
    }

    #[test]
    fn test_legacy_rejects_non_integer_timestamp() {
        let mut map = Map::new();
        map.insert("exp".into(), json!("soon"));
        assert!(from_legacy(map).is_err());
    }

    #[test]
    fn test_wire_omits_absent_fields() {
        let wire = to_current(&Claims {
            subject: Some("u".into()),
            ..Claims::default()
        });
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value, json!({"sub": "u"}));
    }
}
