//! Parsed verification keys and JWT signature checking.

use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};

use crate::SmartResult;
use crate::error::SmartError;
use crate::jwk::KeySet;

struct VerificationKey {
    kid: Option<String>,
    kty: String,
    key: DecodingKey,
}

/// Verification keys ready for signature checks.
///
/// Built once from a [`KeySet`]; encryption keys and keys whose parameters
/// do not parse are skipped.
pub struct Keystore {
    keys: Vec<VerificationKey>,
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field(
                "kids",
                &self.keys.iter().map(|k| k.kid.as_deref()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Keystore {
    /// Parses every usable verification key in `key_set`.
    #[must_use]
    pub fn from_key_set(key_set: &KeySet) -> Self {
        let keys = key_set
            .keys
            .iter()
            .filter(|jwk| !jwk.is_encryption_key())
            .filter_map(|jwk| match jwk.decoding_key() {
                Ok(key) => Some(VerificationKey {
                    kid: jwk.kid.clone(),
                    kty: jwk.kty.clone(),
                    key,
                }),
                Err(e) => {
                    tracing::warn!(
                        kid = ?jwk.kid,
                        category = %e.category(),
                        error = %e,
                        "Skipping unusable JWK"
                    );
                    None
                }
            })
            .collect();

        Self { keys }
    }

    /// Number of usable keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no key could be parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Verifies the token signature.
    ///
    /// Only the signature is checked. Expiry, audience and issuer are left to
    /// the caller. A token carrying a `kid` is checked against that key only;
    /// without one every compatible key is tried.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` if the token is malformed, uses a symmetric
    /// algorithm, names an unknown key, or no key verifies it.
    pub fn verify(&self, token: &str) -> SmartResult<VerifiedToken> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| SmartError::invalid_signature(format!("Malformed token: {}", e)))?;

        let family = key_family(header.alg).ok_or_else(|| {
            SmartError::invalid_signature(format!("Unsupported algorithm: {:?}", header.alg))
        })?;

        let candidates: Vec<&VerificationKey> = self
            .keys
            .iter()
            .filter(|k| k.kty == family)
            .filter(|k| match &header.kid {
                Some(kid) => k.kid.as_deref() == Some(kid.as_str()),
                None => true,
            })
            .collect();

        if candidates.is_empty() {
            return Err(SmartError::invalid_signature(match &header.kid {
                Some(kid) => format!("No verification key with kid '{}'", kid),
                None => format!("No {} verification key", family),
            }));
        }

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let mut last_error = None;
        for candidate in candidates {
            match jsonwebtoken::decode::<serde_json::Value>(token, &candidate.key, &validation) {
                Ok(data) => {
                    return Ok(VerifiedToken {
                        header: data.header,
                        claims: data.claims,
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(SmartError::invalid_signature(
            last_error.map_or_else(|| "Verification failed".to_string(), |e| e.to_string()),
        ))
    }
}

fn key_family(alg: Algorithm) -> Option<&'static str> {
    match alg {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Some("RSA"),
        Algorithm::ES256 | Algorithm::ES384 => Some("EC"),
        _ => None,
    }
}

/// A token whose signature checked out.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// The JOSE header.
    pub header: Header,

    /// The decoded claims, unvalidated.
    pub claims: serde_json::Value,
}

impl VerifiedToken {
    /// The `exp` claim, if present and numeric.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get("exp").and_then(serde_json::Value::as_i64)
    }

    /// Returns `true` if the token has an `exp` claim at or before `now`.
    ///
    /// Tokens without `exp` never expire by this check.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    /// The `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(serde_json::Value::as_str)
    }

    /// The `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.claims.get("iss").and_then(serde_json::Value::as_str)
    }
}
