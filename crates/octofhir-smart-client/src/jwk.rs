//! JSON Web Key and key set types.
//!
//! A [`KeySet`] holds either the local signing identity (RSA keys including
//! private parameters) or a remote server's published verification keys.
//! Private parameters never leave the process: [`KeySet::public_keys`] strips
//! them before a key set is sent to a registration endpoint.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};

use crate::SmartResult;
use crate::error::SmartError;

/// JSON Web Key (RFC 7517).
///
/// Only the parameters needed for RSA and EC signature keys are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Key ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key use ("sig" for signing, "enc" for encryption).
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Permitted key operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,

    /// Algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    // RSA public parameters
    /// RSA modulus (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // RSA private parameters
    /// RSA private exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// First prime factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    /// Second prime factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// First factor CRT exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,

    /// Second factor CRT exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,

    /// First CRT coefficient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,

    // EC parameters
    /// EC curve name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    /// Builds a signing JWK from an RSA private key.
    ///
    /// The key is tagged `use: "sig"` and `alg: "RS384"`.
    #[must_use]
    pub fn from_rsa_private_key(kid: impl Into<String>, key: &RsaPrivateKey) -> Self {
        let primes = key.primes();
        Self {
            kty: "RSA".to_string(),
            kid: Some(kid.into()),
            use_: Some("sig".to_string()),
            key_ops: None,
            alg: Some("RS384".to_string()),
            n: Some(encode_biguint(key.n())),
            e: Some(encode_biguint(key.e())),
            d: Some(encode_biguint(key.d())),
            p: primes.first().map(encode_biguint),
            q: primes.get(1).map(encode_biguint),
            dp: key.dp().map(encode_biguint),
            dq: key.dq().map(encode_biguint),
            qi: key.crt_coefficient().as_ref().map(encode_biguint),
            crv: None,
            x: None,
            y: None,
        }
    }

    /// Imports an RSA private key from PEM (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the PEM cannot be parsed as an RSA private key.
    pub fn from_rsa_pem(kid: impl Into<String>, pem: &str) -> SmartResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| SmartError::invalid_key(format!("Unreadable RSA PEM: {}", e)))?;
        Ok(Self::from_rsa_private_key(kid, &key))
    }

    /// Returns `true` if the key is meant for signatures.
    #[must_use]
    pub fn is_signing_key(&self) -> bool {
        if let Some(use_) = &self.use_ {
            return use_ == "sig";
        }
        self.key_ops
            .as_ref()
            .is_some_and(|ops| ops.iter().any(|op| op == "sign"))
    }

    /// Returns `true` if the key is marked for encryption only.
    #[must_use]
    pub fn is_encryption_key(&self) -> bool {
        self.use_.as_deref() == Some("enc")
    }

    /// Returns `true` if private key material is present.
    #[must_use]
    pub fn has_private_material(&self) -> bool {
        self.d.is_some()
    }

    /// Returns a copy of this key with all private parameters removed.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
            key_ops: self.key_ops.as_ref().map(|ops| {
                ops.iter()
                    .filter(|op| op.as_str() != "sign")
                    .cloned()
                    .collect()
            }),
            ..self.clone()
        }
    }

    /// Builds the `jsonwebtoken` signing key from the private RSA parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key is not RSA, lacks private material,
    /// or its parameters do not form a valid key.
    pub fn encoding_key(&self) -> SmartResult<EncodingKey> {
        if self.kty != "RSA" {
            return Err(SmartError::invalid_key(format!(
                "Key type {} cannot sign RS384 assertions",
                self.kty
            )));
        }

        let n = decode_param("n", self.n.as_deref())?;
        let e = decode_param("e", self.e.as_deref())?;
        let d = decode_param("d", self.d.as_deref())?;
        let primes = match (self.p.as_deref(), self.q.as_deref()) {
            (Some(p), Some(q)) => vec![decode_param("p", Some(p))?, decode_param("q", Some(q))?],
            _ => Vec::new(),
        };

        let private_key = RsaPrivateKey::from_components(n, e, d, primes)
            .map_err(|e| SmartError::invalid_key(e.to_string()))?;

        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| SmartError::invalid_key(e.to_string()))?;

        EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| SmartError::invalid_key(e.to_string()))
    }

    /// Builds the `jsonwebtoken` verification key from the public parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for unsupported key types or missing parameters.
    pub fn decoding_key(&self) -> SmartResult<DecodingKey> {
        match self.kty.as_str() {
            "RSA" => {
                let n = required("n", self.n.as_deref())?;
                let e = required("e", self.e.as_deref())?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| SmartError::invalid_key(e.to_string()))
            }
            "EC" => {
                let x = required("x", self.x.as_deref())?;
                let y = required("y", self.y.as_deref())?;
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| SmartError::invalid_key(e.to_string()))
            }
            other => Err(SmartError::invalid_key(format!(
                "Unsupported key type: {}",
                other
            ))),
        }
    }
}

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl KeySet {
    /// Creates a new empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a key set from a list of keys.
    #[must_use]
    pub fn from_keys(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Parses a key set from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the JSON is not a JWK set.
    pub fn from_json(json: &str) -> SmartResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SmartError::invalid_key(format!("Invalid JWKS JSON: {}", e)))
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the set holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Finds a key by its key ID.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Selects the key used to sign client assertions.
    ///
    /// With a key ID, that exact key is returned. Without one, the first key
    /// whose usage is signature is chosen.
    ///
    /// # Errors
    ///
    /// - `UnknownKeyId` if `kid` is given but not in the set
    /// - `NoSigningKey` if no key is marked for signing
    pub fn signing_key(&self, kid: Option<&str>) -> SmartResult<&Jwk> {
        match kid {
            Some(kid) => self.find(kid).ok_or_else(|| SmartError::unknown_key_id(kid)),
            None => self
                .keys
                .iter()
                .find(|k| k.is_signing_key())
                .ok_or(SmartError::NoSigningKey),
        }
    }

    /// Returns the public half of every key in the set.
    #[must_use]
    pub fn public_keys(&self) -> Self {
        Self {
            keys: self.keys.iter().map(Jwk::to_public).collect(),
        }
    }
}

fn encode_biguint(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn required<'a>(name: &str, value: Option<&'a str>) -> SmartResult<&'a str> {
    value.ok_or_else(|| SmartError::invalid_key(format!("Missing JWK parameter '{}'", name)))
}

fn decode_param(name: &str, value: Option<&str>) -> SmartResult<BigUint> {
    let encoded = required(name, value)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SmartError::invalid_key(format!("JWK parameter '{}' is not base64url", name)))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
pub(crate) mod test_keys {
    use super::*;
    use std::sync::OnceLock;

    /// RSA keys are slow to generate in debug builds, so tests share two.
    pub(crate) fn rsa_key(index: usize) -> RsaPrivateKey {
        static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
        KEYS.get_or_init(|| {
            let mut rng = rand::rngs::OsRng;
            (0..2)
                .map(|_| RsaPrivateKey::new(&mut rng, 2048).unwrap())
                .collect()
        })[index]
            .clone()
    }

    pub(crate) fn signing_jwk(kid: &str, index: usize) -> Jwk {
        Jwk::from_rsa_private_key(kid, &rsa_key(index))
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::signing_jwk;
    use super::*;

    #[test]
    fn test_from_rsa_private_key() {
        let jwk = signing_jwk("key-1", 0);
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid.as_deref(), Some("key-1"));
        assert_eq!(jwk.use_.as_deref(), Some("sig"));
        assert_eq!(jwk.alg.as_deref(), Some("RS384"));
        assert!(jwk.has_private_material());
        assert!(jwk.p.is_some() && jwk.q.is_some());
    }

    #[test]
    fn test_to_public_strips_private_material() {
        let jwk = signing_jwk("key-1", 0);
        let public = jwk.to_public();

        assert!(!public.has_private_material());
        assert!(public.p.is_none());
        assert!(public.qi.is_none());
        assert_eq!(public.n, jwk.n);
        assert_eq!(public.e, jwk.e);

        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("\"d\""));
        assert!(json.contains("\"use\":\"sig\""));
    }

    #[test]
    fn test_encoding_and_decoding_keys() {
        let jwk = signing_jwk("key-1", 0);
        assert!(jwk.encoding_key().is_ok());
        assert!(jwk.to_public().decoding_key().is_ok());

        // Public half cannot sign
        let err = jwk.to_public().encoding_key().unwrap_err();
        assert!(matches!(err, SmartError::InvalidKey { .. }));
    }

    #[test]
    fn test_encoding_key_from_n_e_d_only() {
        let mut jwk = signing_jwk("key-1", 0);
        jwk.p = None;
        jwk.q = None;
        jwk.dp = None;
        jwk.dq = None;
        jwk.qi = None;
        assert!(jwk.encoding_key().is_ok());
    }

    #[test]
    fn test_from_rsa_pem() {
        let pem = test_keys::rsa_key(0).to_pkcs8_pem(LineEnding::LF).unwrap();
        let jwk = Jwk::from_rsa_pem("pem-key", &pem).unwrap();
        assert_eq!(jwk, signing_jwk("pem-key", 0));

        let err = Jwk::from_rsa_pem("bad", "not a pem").unwrap_err();
        assert!(matches!(err, SmartError::InvalidKey { .. }));
    }

    #[test]
    fn test_signing_key_selection() {
        let mut enc = signing_jwk("enc-key", 1).to_public();
        enc.use_ = Some("enc".to_string());

        let set = KeySet::from_keys(vec![enc, signing_jwk("sig-key", 0)]);

        assert_eq!(set.signing_key(None).unwrap().kid.as_deref(), Some("sig-key"));
        assert_eq!(
            set.signing_key(Some("enc-key")).unwrap().kid.as_deref(),
            Some("enc-key")
        );
        assert!(matches!(
            set.signing_key(Some("missing")),
            Err(SmartError::UnknownKeyId { .. })
        ));
    }

    #[test]
    fn test_no_signing_key() {
        let mut enc = signing_jwk("enc-key", 1);
        enc.use_ = Some("enc".to_string());
        let set = KeySet::from_keys(vec![enc]);
        assert!(matches!(set.signing_key(None), Err(SmartError::NoSigningKey)));
        assert!(matches!(
            KeySet::new().signing_key(None),
            Err(SmartError::NoSigningKey)
        ));
    }

    #[test]
    fn test_key_ops_signing() {
        let mut jwk = signing_jwk("ops", 0);
        jwk.use_ = None;
        jwk.key_ops = Some(vec!["sign".to_string(), "verify".to_string()]);
        assert!(jwk.is_signing_key());
        assert_eq!(jwk.to_public().key_ops, Some(vec!["verify".to_string()]));
    }

    #[test]
    fn test_key_set_json() {
        let json = r#"{"keys":[{"kty":"RSA","kid":"a","use":"sig","n":"AQAB","e":"AQAB"}]}"#;
        let set = KeySet::from_json(json).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.find("a").is_some());
        assert!(set.find("b").is_none());

        assert!(KeySet::from_json("{\"nope\":1}").is_err());
    }

    #[test]
    fn test_decoding_key_unsupported_type() {
        let jwk = Jwk {
            kty: "oct".to_string(),
            ..signing_jwk("k", 0).to_public()
        };
        assert!(matches!(
            jwk.decoding_key(),
            Err(SmartError::InvalidKey { .. })
        ));
    }
}
