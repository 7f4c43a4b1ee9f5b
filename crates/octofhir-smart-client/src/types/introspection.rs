//! Token introspection results (RFC 7662).

use serde::{Deserialize, Serialize};

use crate::assertion::StringOrArray;

/// Response from an introspection endpoint.
///
/// Only `active` is required. SMART context fields and anything else the
/// server returns are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active.
    #[serde(default)]
    pub active: bool,

    /// Space-separated granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Resource owner username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Token type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Intended audience(s).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<StringOrArray>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Token identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Additional claims.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of remote token validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Introspection {
    /// The issuer reports the token active.
    Active(Box<IntrospectionResponse>),

    /// The token is inactive, expired, revoked or unknown. The issuer does
    /// not say which.
    Inactive,
}

impl Introspection {
    /// Returns `true` for an active token.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Returns the introspection response for an active token.
    #[must_use]
    pub fn response(&self) -> Option<&IntrospectionResponse> {
        match self {
            Self::Active(response) => Some(response),
            Self::Inactive => None,
        }
    }
}

impl From<IntrospectionResponse> for Introspection {
    fn from(response: IntrospectionResponse) -> Self {
        if response.active {
            Self::Active(Box::new(response))
        } else {
            Self::Inactive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_response() {
        let json = serde_json::json!({
            "active": true,
            "client_id": "backend",
            "scope": "system/*.read",
            "aud": ["https://fhir.example.com"],
            "patient": "Patient/123"
        });
        let response: IntrospectionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.extra["patient"], "Patient/123");
        assert!(response.aud.as_ref().unwrap().contains("https://fhir.example.com"));

        let result = Introspection::from(response);
        assert!(result.is_active());
        assert_eq!(
            result.response().unwrap().client_id.as_deref(),
            Some("backend")
        );
    }

    #[test]
    fn test_inactive_response() {
        let response: IntrospectionResponse =
            serde_json::from_value(serde_json::json!({"active": false})).unwrap();
        assert_eq!(Introspection::from(response), Introspection::Inactive);
    }

    #[test]
    fn test_missing_active_is_inactive() {
        let response: IntrospectionResponse =
            serde_json::from_value(serde_json::json!({"sub": "x"})).unwrap();
        let result = Introspection::from(response);
        assert!(!result.is_active());
        assert!(result.response().is_none());
    }
}
