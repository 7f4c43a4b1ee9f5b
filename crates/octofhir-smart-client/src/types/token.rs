//! Access token response and cache record.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An access token obtained from a token endpoint.
///
/// The token endpoint's JSON response deserializes directly into this type;
/// `issued_at` is absent there and stamped by the client on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccessToken {
    /// The bearer token value.
    pub access_token: String,

    /// Token type, usually "Bearer".
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime in seconds, counted from `issued_at`.
    #[serde(default)]
    pub expires_in: i64,

    /// Time the token was received (Unix timestamp).
    #[serde(default)]
    pub issued_at: i64,

    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CachedAccessToken {
    /// Creates a token record issued at the current time.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in,
            issued_at: OffsetDateTime::now_utc().unix_timestamp(),
            scope: None,
        }
    }

    /// Sets the issue time.
    #[must_use]
    pub fn with_issued_at(mut self, issued_at: i64) -> Self {
        self.issued_at = issued_at;
        self
    }

    /// Returns the Unix time at which the token stops being reusable.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.issued_at.saturating_add(self.expires_in)
    }

    /// Returns `true` while `issued_at + expires_in > now`.
    ///
    /// A token expiring exactly at `now` is stale.
    #[must_use]
    pub fn is_fresh_at(&self, now: i64) -> bool {
        self.expires_at() > now
    }

    /// Checks freshness against the system clock.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(OffsetDateTime::now_utc().unix_timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_response() {
        let json = serde_json::json!({
            "access_token": "abc",
            "token_type": "bearer",
            "expires_in": 300,
            "scope": "system/*.read"
        });
        let token: CachedAccessToken = serde_json::from_value(json).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, 300);
        assert_eq!(token.issued_at, 0);
        assert_eq!(token.scope.as_deref(), Some("system/*.read"));
    }

    #[test]
    fn test_token_type_defaults_to_bearer() {
        let token: CachedAccessToken =
            serde_json::from_value(serde_json::json!({"access_token": "abc"})).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 0);
    }

    #[test]
    fn test_freshness_boundary() {
        let token = CachedAccessToken::new("t", 60).with_issued_at(1_000);
        assert_eq!(token.expires_at(), 1_060);
        assert!(token.is_fresh_at(1_059));
        assert!(!token.is_fresh_at(1_060));
        assert!(!token.is_fresh_at(2_000));
    }

    #[test]
    fn test_fresh_against_clock() {
        assert!(CachedAccessToken::new("t", 300).is_fresh());
        assert!(!CachedAccessToken::new("t", 0).is_fresh());
    }
}
