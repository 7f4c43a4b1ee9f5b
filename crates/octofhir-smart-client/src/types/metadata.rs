//! Remote server metadata.

use serde::{Deserialize, Serialize};

use crate::jwk::KeySet;

/// OAuth / SMART configuration discovered for a remote server.
///
/// Fetched from `{server}/.well-known/smart-configuration` or supplied
/// directly when the server is added. Once stored it is only replaced by an
/// explicit reload.
///
/// # Example Document
///
/// ```json
/// {
///   "token_endpoint": "https://fhir.example.com/auth/token",
///   "registration_endpoint": "https://fhir.example.com/auth/register",
///   "jwks_uri": "https://fhir.example.com/.well-known/jwks.json",
///   "introspection_endpoint": "https://fhir.example.com/auth/introspect"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    /// URL to the OAuth 2.0 Token endpoint.
    pub token_endpoint: String,

    /// Dynamic client registration endpoint (RFC 7591).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// URL to the server's JSON Web Key Set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Token introspection endpoint (RFC 7662).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,

    /// Issuer identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Verification keys embedded directly in the metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<KeySet>,

    /// Supported grant types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    /// Supported token endpoint authentication methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Supported OAuth scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// SMART capabilities advertised by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

impl ServerMetadata {
    /// Creates metadata with only a token endpoint.
    #[must_use]
    pub fn new(token_endpoint: impl Into<String>) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            registration_endpoint: None,
            jwks_uri: None,
            introspection_endpoint: None,
            issuer: None,
            jwks: None,
            grant_types_supported: None,
            token_endpoint_auth_methods_supported: None,
            scopes_supported: None,
            capabilities: None,
        }
    }

    /// Sets the registration endpoint.
    #[must_use]
    pub fn with_registration_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.registration_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the JWKS URI.
    #[must_use]
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Sets the introspection endpoint.
    #[must_use]
    pub fn with_introspection_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.introspection_endpoint = Some(endpoint.into());
        self
    }

    /// Embeds a verification key set.
    #[must_use]
    pub fn with_jwks(mut self, jwks: KeySet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Returns `true` if the server supports dynamic client registration.
    #[must_use]
    pub fn supports_registration(&self) -> bool {
        self.registration_endpoint.is_some()
    }
}
