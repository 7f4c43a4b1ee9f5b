//! Configuration for the token client and validator.
//!
//! All sections default sensibly, so an empty TOML document is a valid
//! configuration for the client side. The validator needs at least one key
//! source or an introspection endpoint before it can do anything useful, but
//! that is checked at call time rather than here.
//!
//! ```toml
//! [client]
//! signing_key_id = "key-1"
//! scopes = "system/*.read"
//! client_name = "lab-results-sync"
//!
//! [http]
//! request_timeout = "10s"
//!
//! [validator]
//! jwks_uri = "https://auth.example.com/.well-known/jwks.json"
//! introspection_endpoint = "https://auth.example.com/introspect"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::jwk::KeySet;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartClientConfig {
    /// Calling-side settings.
    pub client: ClientConfig,

    /// HTTP transport settings shared by client and validator.
    pub http: HttpConfig,

    /// Receiving-side settings.
    pub validator: ValidatorConfig,
}

/// Token client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Key used to sign assertions. When unset, the first signature key.
    pub signing_key_id: Option<String>,

    /// Scopes requested when the caller passes none.
    pub scopes: Option<String>,

    /// Name sent during dynamic registration.
    pub client_name: Option<String>,

    /// Advertised in registration instead of the inline public key set.
    pub jwks_uri: Option<String>,

    /// Value sent as the `client_assertion_type` form parameter.
    pub client_assertion_type: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signing_key_id: None,
            scopes: None,
            client_name: None,
            jwks_uri: None,
            client_assertion_type: String::new(),
        }
    }
}

impl ClientConfig {
    /// Registration client name, falling back to the crate name.
    #[must_use]
    pub fn client_name_or_default(&self) -> &str {
        self.client_name.as_deref().unwrap_or(DEFAULT_CLIENT_NAME)
    }
}

/// Name used in registration requests when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "octofhir-smart-client";

/// The JWT bearer assertion type defined by RFC 7523.
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout applied to every request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Responses declaring a larger Content-Length are rejected.
    pub max_response_size: usize,

    /// Allow plain `http://` URLs. Only for local development and tests.
    pub allow_http: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

/// Token validator settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Inline verification keys. Takes precedence over `jwks_uri`.
    pub jwks: Option<KeySet>,

    /// Where to fetch verification keys.
    pub jwks_uri: Option<String>,

    /// Issuer's introspection endpoint for remote validation.
    pub introspection_endpoint: Option<String>,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {message}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl SmartClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and any error from
    /// [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file and validates it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The request timeout or response size limit is zero
    /// - A configured URL does not parse
    /// - A configured URL uses plain HTTP while `allow_http` is off
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "http.request_timeout must be > 0".to_string(),
            ));
        }

        if self.http.max_response_size == 0 {
            return Err(ConfigError::InvalidValue(
                "http.max_response_size must be > 0".to_string(),
            ));
        }

        let urls = [
            ("client.jwks_uri", self.client.jwks_uri.as_deref()),
            ("validator.jwks_uri", self.validator.jwks_uri.as_deref()),
            (
                "validator.introspection_endpoint",
                self.validator.introspection_endpoint.as_deref(),
            ),
        ];

        for (name, value) in urls {
            if let Some(value) = value {
                self.validate_url(name, value)?;
            }
        }

        if let Some(kid) = &self.client.signing_key_id
            && kid.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue(
                "client.signing_key_id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_url(&self, name: &str, value: &str) -> Result<(), ConfigError> {
        let url = url::Url::parse(value)
            .map_err(|e| ConfigError::InvalidValue(format!("{}: '{}' ({})", name, value, e)))?;

        match url.scheme() {
            "https" => Ok(()),
            "http" if self.http.allow_http => Ok(()),
            other => Err(ConfigError::InvalidValue(format!(
                "{}: scheme '{}' is not allowed",
                name, other
            ))),
        }
    }
}
