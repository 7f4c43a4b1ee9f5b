//! JWT client assertions for the client-credentials grant (RFC 7523).
//!
//! The assertion authenticates this client at a token endpoint:
//!
//! - `iss` and `sub` are the client id issued at registration
//! - `aud` is the token endpoint URL
//! - `exp` is five minutes after `iat`
//! - `jti` is a fresh UUID so the server can reject replays
//!
//! Assertions are always signed with RS384.

use jsonwebtoken::{Algorithm, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::SmartResult;
use crate::error::SmartError;
use crate::jwk::KeySet;

/// Lifetime of a generated assertion in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 300;

/// JWT claims for client assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    /// Issuer, the client id.
    pub iss: String,

    /// Subject, the client id.
    pub sub: String,

    /// Audience, the token endpoint URL.
    pub aud: StringOrArray,

    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// Unique token identifier.
    pub jti: String,

    /// Issued at time as Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl ClientAssertionClaims {
    /// Builds claims for `client_id` addressed to `audience`, issued at `now`.
    #[must_use]
    pub fn new(client_id: &str, audience: &str, now: i64) -> Self {
        Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: StringOrArray::String(audience.to_string()),
            exp: now + ASSERTION_LIFETIME_SECS,
            jti: Uuid::new_v4().to_string(),
            iat: Some(now),
        }
    }
}

/// Audience claim can be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    /// Single string audience.
    String(String),
    /// Array of audience strings.
    Array(Vec<String>),
}

impl StringOrArray {
    /// Checks if the audience contains the specified value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::String(s) => s == value,
            Self::Array(arr) => arr.iter().any(|s| s == value),
        }
    }
}

/// Signs a client assertion with a key from `keys`.
///
/// With `key_id` the matching key is used, otherwise the first key whose
/// usage is signature.
///
/// # Errors
///
/// - `UnknownKeyId` if `key_id` is not in the set
/// - `NoSigningKey` if no key is marked for signing
/// - `InvalidKey` if the chosen key has no private RSA material
/// - `Signing` if JWT encoding fails
pub fn generate_assertion(
    keys: &KeySet,
    client_id: &str,
    audience: &str,
    key_id: Option<&str>,
) -> SmartResult<String> {
    let jwk = keys.signing_key(key_id)?;
    if !jwk.has_private_material() {
        return Err(SmartError::invalid_key(format!(
            "Key {} has no private material",
            jwk.kid.as_deref().unwrap_or("<unnamed>")
        )));
    }

    let encoding_key = jwk.encoding_key()?;

    let mut header = Header::new(Algorithm::RS384);
    header.typ = Some("JWT".to_string());
    header.kid = jwk.kid.clone();

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = ClientAssertionClaims::new(client_id, audience, now);

    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| SmartError::signing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::test_keys::signing_jwk;
    use jsonwebtoken::Validation;

    fn keys() -> KeySet {
        KeySet::from_keys(vec![signing_jwk("key-1", 0), signing_jwk("key-2", 1)])
    }

    fn decode(token: &str, kid: &str) -> ClientAssertionClaims {
        let set = keys();
        let public = set.find(kid).unwrap().to_public();
        let mut validation = Validation::new(Algorithm::RS384);
        validation.set_audience(&["https://fhir.example.com/token"]);
        jsonwebtoken::decode::<ClientAssertionClaims>(
            token,
            &public.decoding_key().unwrap(),
            &validation,
        )
        .unwrap()
        .claims
    }

    #[test]
    fn test_assertion_header_and_claims() {
        let token =
            generate_assertion(&keys(), "client-1", "https://fhir.example.com/token", None)
                .unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS384);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
        assert_eq!(header.kid.as_deref(), Some("key-1"));

        let claims = decode(&token, "key-1");
        assert_eq!(claims.iss, "client-1");
        assert_eq!(claims.sub, "client-1");
        assert!(claims.aud.contains("https://fhir.example.com/token"));
        assert_eq!(claims.exp - claims.iat.unwrap(), ASSERTION_LIFETIME_SECS);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn test_assertion_with_explicit_key_id() {
        let token = generate_assertion(
            &keys(),
            "client-1",
            "https://fhir.example.com/token",
            Some("key-2"),
        )
        .unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key-2"));
        decode(&token, "key-2");
    }

    #[test]
    fn test_unique_jti() {
        let a = generate_assertion(&keys(), "c", "https://fhir.example.com/token", None).unwrap();
        let b = generate_assertion(&keys(), "c", "https://fhir.example.com/token", None).unwrap();
        assert_ne!(decode(&a, "key-1").jti, decode(&b, "key-1").jti);
    }

    #[test]
    fn test_assertion_key_errors() {
        let err = generate_assertion(&keys(), "c", "aud", Some("nope")).unwrap_err();
        assert!(matches!(err, SmartError::UnknownKeyId { .. }));

        let err = generate_assertion(&KeySet::new(), "c", "aud", None).unwrap_err();
        assert!(matches!(err, SmartError::NoSigningKey));

        let public_only = keys().public_keys();
        let err = generate_assertion(&public_only, "c", "aud", None).unwrap_err();
        assert!(matches!(err, SmartError::InvalidKey { .. }));
    }

    #[test]
    fn test_string_or_array() {
        let aud: StringOrArray = serde_json::from_str(r#""https://a""#).unwrap();
        assert!(aud.contains("https://a"));

        let aud: StringOrArray = serde_json::from_str(r#"["x","y"]"#).unwrap();
        assert!(aud.contains("y"));
        assert!(!aud.contains("z"));
        assert!(!StringOrArray::Array(vec![]).contains("x"));
    }
}
