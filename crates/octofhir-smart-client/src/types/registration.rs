//! Dynamic client registration types (RFC 7591).

use serde::{Deserialize, Serialize};

use crate::jwk::KeySet;

/// Authentication method advertised in registration requests.
pub const TOKEN_ENDPOINT_AUTH_METHOD: &str = "client_credentials";

/// Body POSTed to a registration endpoint.
///
/// Exactly one of `jwks` or `jwks_uri` is sent. `jwks` only ever carries
/// public key parameters.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    /// Human-readable client name.
    pub client_name: String,

    /// Token endpoint authentication method.
    pub token_endpoint_auth_method: String,

    /// Public signing keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<KeySet>,

    /// URL where the client publishes its public keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
}

impl RegistrationRequest {
    /// Builds a request advertising the given keys.
    ///
    /// When `jwks_uri` is set it is sent instead of the inline key set.
    #[must_use]
    pub fn new(client_name: impl Into<String>, keys: &KeySet, jwks_uri: Option<&str>) -> Self {
        let (jwks, jwks_uri) = match jwks_uri {
            Some(uri) => (None, Some(uri.to_string())),
            None => (Some(keys.public_keys()), None),
        };

        Self {
            client_name: client_name.into(),
            token_endpoint_auth_method: TOKEN_ENDPOINT_AUTH_METHOD.to_string(),
            jwks,
            jwks_uri,
        }
    }
}

/// This client's identity as known to one remote server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// Client identifier issued by the server.
    pub client_id: String,

    /// Registered client name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Registered token endpoint authentication method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,

    /// Time the client id was issued (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_issued_at: Option<i64>,

    /// Any other registration metadata returned by the server.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClientRegistration {
    /// Creates a registration holding only a client id, as when a client is
    /// provisioned out-of-band.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_name: None,
            token_endpoint_auth_method: None,
            client_id_issued_at: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Result of a [`register`](crate::TokenClient::register) call.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// The client is registered (either just now or previously).
    Registered(ClientRegistration),

    /// The server has no registration endpoint; clients must be provisioned
    /// out-of-band.
    Unavailable,
}

impl RegistrationOutcome {
    /// Returns the registration, if any.
    #[must_use]
    pub fn into_registration(self) -> Option<ClientRegistration> {
        match self {
            Self::Registered(registration) => Some(registration),
            Self::Unavailable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::test_keys::signing_jwk;

    #[test]
    fn test_request_with_inline_public_keys() {
        let keys = KeySet::from_keys(vec![signing_jwk("key-1", 0)]);
        let request = RegistrationRequest::new("backend", &keys, None);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["client_name"], "backend");
        assert_eq!(json["token_endpoint_auth_method"], "client_credentials");
        assert_eq!(json["jwks"]["keys"][0]["kid"], "key-1");
        assert!(json["jwks"]["keys"][0].get("d").is_none());
        assert!(json.get("jwks_uri").is_none());
    }

    #[test]
    fn test_request_with_jwks_uri() {
        let keys = KeySet::from_keys(vec![signing_jwk("key-1", 0)]);
        let request = RegistrationRequest::new("backend", &keys, Some("https://me/jwks"));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jwks_uri"], "https://me/jwks");
        assert!(json.get("jwks").is_none());
    }

    #[test]
    fn test_registration_keeps_extra_metadata() {
        let json = serde_json::json!({
            "client_id": "abc123",
            "client_name": "backend",
            "grant_types": ["client_credentials"]
        });
        let registration: ClientRegistration = serde_json::from_value(json).unwrap();
        assert_eq!(registration.client_id, "abc123");
        assert_eq!(registration.client_name.as_deref(), Some("backend"));
        assert!(registration.extra.contains_key("grant_types"));

        let back = serde_json::to_value(&registration).unwrap();
        assert_eq!(back["grant_types"][0], "client_credentials");
    }

    #[test]
    fn test_outcome_into_registration() {
        let outcome = RegistrationOutcome::Registered(ClientRegistration::new("abc"));
        assert_eq!(outcome.into_registration().unwrap().client_id, "abc");
        assert!(RegistrationOutcome::Unavailable.into_registration().is_none());
    }
}
