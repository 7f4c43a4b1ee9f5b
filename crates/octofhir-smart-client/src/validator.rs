//! Receiving side: bearer token validation.
//!
//! A resource server validates incoming tokens either locally, by checking
//! the signature against the issuer's keys, or remotely through the issuer's
//! introspection endpoint.

use tokio::sync::OnceCell;

use crate::SmartResult;
use crate::config::{ConfigError, HttpConfig, SmartClientConfig, ValidatorConfig};
use crate::discovery::fetch_key_set;
use crate::error::SmartError;
use crate::http::HttpClient;
use crate::keystore::{Keystore, VerifiedToken};
use crate::types::{Introspection, IntrospectionResponse};

/// Bearer token validator.
///
/// The keystore is resolved on first use and reused for the lifetime of the
/// validator. Build a new validator to pick up rotated keys.
#[derive(Debug)]
pub struct TokenValidator {
    config: ValidatorConfig,
    http: HttpClient,
    keystore: OnceCell<Keystore>,
}

impl TokenValidator {
    /// Creates a validator.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn new(config: ValidatorConfig, http: HttpConfig) -> SmartResult<Self> {
        Ok(Self {
            config,
            http: HttpClient::new(http)?,
            keystore: OnceCell::new(),
        })
    }

    /// Creates a validator from the `validator` and `http` sections.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn from_config(config: &SmartClientConfig) -> SmartResult<Self> {
        Self::new(config.validator.clone(), config.http.clone())
    }

    /// Validator settings.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Resolves the verification keystore.
    ///
    /// Inline keys are used when configured, otherwise the `jwks_uri` is
    /// fetched once. With neither, `None` is returned and nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns `KeyFetch` if the key set cannot be fetched. A failed fetch is
    /// not cached, so the next call retries.
    pub async fn get_keystore(&self) -> SmartResult<Option<&Keystore>> {
        if self.config.jwks.is_none() && self.config.jwks_uri.is_none() {
            return Ok(None);
        }

        let keystore = self
            .keystore
            .get_or_try_init(|| self.resolve_keystore())
            .await?;

        Ok(Some(keystore))
    }

    async fn resolve_keystore(&self) -> SmartResult<Keystore> {
        if let Some(jwks) = &self.config.jwks {
            tracing::debug!(keys = jwks.len(), "Using inline verification keys");
            return Ok(Keystore::from_key_set(jwks));
        }

        let uri = self
            .config
            .jwks_uri
            .as_deref()
            .ok_or(SmartError::NoKeysConfigured)?;
        let keys = fetch_key_set(&self.http, uri).await?;
        Ok(Keystore::from_key_set(&keys))
    }

    /// Verifies a token's signature against the keystore.
    ///
    /// Expiry is not checked; see [`VerifiedToken::is_expired_at`].
    ///
    /// # Errors
    ///
    /// - `NoKeysConfigured` if neither inline keys nor a `jwks_uri` is set
    /// - `KeyFetch` if the keys cannot be fetched
    /// - `InvalidSignature` if verification fails
    pub async fn validate_local(&self, token: &str) -> SmartResult<VerifiedToken> {
        let keystore = self
            .get_keystore()
            .await?
            .ok_or(SmartError::NoKeysConfigured)?;
        keystore.verify(token)
    }

    /// Asks the issuer's introspection endpoint whether a token is active.
    ///
    /// # Errors
    ///
    /// - `Configuration` if no introspection endpoint is configured
    /// - `Introspection` if the endpoint is unreachable, returns non-2xx or
    ///   an unparseable body
    pub async fn validate_remote(&self, token: &str) -> SmartResult<Introspection> {
        let endpoint = self
            .config
            .introspection_endpoint
            .as_deref()
            .ok_or_else(|| {
                SmartError::from(ConfigError::Missing(
                    "validator.introspection_endpoint".to_string(),
                ))
            })?;

        let response: IntrospectionResponse = self
            .http
            .post_form(endpoint, &[("token", token)])
            .await
            .map_err(|failure| {
                let err = failure.into_error(SmartError::introspection);
                tracing::warn!(
                    endpoint = %endpoint,
                    category = %err.category(),
                    error = %err,
                    "Introspection failed"
                );
                err
            })?;

        let result = Introspection::from(response);
        tracing::debug!(active = result.is_active(), "Introspected token");
        Ok(result)
    }
}
