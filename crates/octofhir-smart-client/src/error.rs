//! Error types for the SMART Backend Services client and validator.
//!
//! Every fallible operation in this crate returns [`SmartResult`]. Network
//! and storage failures are surfaced as-is; nothing here retries.

use std::fmt;

/// Errors that can occur while managing credentials and tokens.
#[derive(Debug, thiserror::Error)]
pub enum SmartError {
    /// The server's `.well-known/smart-configuration` could not be fetched or parsed.
    #[error("Discovery failed for {server}: {message}")]
    Discovery {
        /// The server base URL.
        server: String,
        /// Upstream HTTP status, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// A JWKS could not be fetched or parsed.
    #[error("Key fetch failed for {uri}: {message}")]
    KeyFetch {
        /// The JWKS URI.
        uri: String,
        /// Upstream HTTP status, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The local key set contains no key usable for signing.
    #[error("No signing key available in the local key set")]
    NoSigningKey,

    /// A key id was requested that is not present in the local key set.
    #[error("Unknown key id: {kid}")]
    UnknownKeyId {
        /// The missing key id.
        kid: String,
    },

    /// The token signature could not be verified.
    #[error("Invalid signature: {message}")]
    InvalidSignature {
        /// Description of why verification failed.
        message: String,
    },

    /// No client registration exists for the server and none can be obtained.
    #[error("No client registration for {server}")]
    NoClient {
        /// The server base URL.
        server: String,
    },

    /// The token endpoint rejected the request or could not be reached.
    #[error("Token request failed{}: {body}", fmt_status(.status))]
    TokenRequest {
        /// Upstream HTTP status, if a response was received.
        status: Option<u16>,
        /// Upstream response body or transport error description.
        body: String,
    },

    /// Dynamic client registration failed.
    #[error("Registration failed{}: {body}", fmt_status(.status))]
    Registration {
        /// Upstream HTTP status, if a response was received.
        status: Option<u16>,
        /// Upstream response body or transport error description.
        body: String,
    },

    /// The introspection endpoint could not be reached or returned an error.
    #[error("Introspection failed{}: {message}", fmt_status(.status))]
    Introspection {
        /// Upstream HTTP status, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// No verification keys are configured or resolvable.
    #[error("No verification keys configured")]
    NoKeysConfigured,

    /// The server has not been added to the credential store.
    #[error("Unknown server: {server}")]
    UnknownServer {
        /// The server base URL.
        server: String,
    },

    /// Key material is malformed or unsuitable for the requested operation.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// Signing the assertion failed.
    #[error("Signing failed: {message}")]
    Signing {
        /// Description of the signing error.
        message: String,
    },

    /// A URL could not be parsed or uses a disallowed scheme.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Description of the problem.
        message: String,
    },

    /// The credential store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The configuration is incomplete or invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl From<crate::config::ConfigError> for SmartError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl SmartError {
    /// Creates a new `Discovery` error.
    #[must_use]
    pub fn discovery(
        server: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Discovery {
            server: server.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a new `KeyFetch` error.
    #[must_use]
    pub fn key_fetch(uri: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::KeyFetch {
            uri: uri.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a new `UnknownKeyId` error.
    #[must_use]
    pub fn unknown_key_id(kid: impl Into<String>) -> Self {
        Self::UnknownKeyId { kid: kid.into() }
    }

    /// Creates a new `InvalidSignature` error.
    #[must_use]
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature {
            message: message.into(),
        }
    }

    /// Creates a new `NoClient` error.
    #[must_use]
    pub fn no_client(server: impl Into<String>) -> Self {
        Self::NoClient {
            server: server.into(),
        }
    }

    /// Creates a new `TokenRequest` error.
    #[must_use]
    pub fn token_request(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::TokenRequest {
            status,
            body: body.into(),
        }
    }

    /// Creates a new `Registration` error.
    #[must_use]
    pub fn registration(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Registration {
            status,
            body: body.into(),
        }
    }

    /// Creates a new `Introspection` error.
    #[must_use]
    pub fn introspection(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Introspection {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `UnknownServer` error.
    #[must_use]
    pub fn unknown_server(server: impl Into<String>) -> Self {
        Self::UnknownServer {
            server: server.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the upstream HTTP status carried by this error, if any.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Discovery { status, .. }
            | Self::KeyFetch { status, .. }
            | Self::TokenRequest { status, .. }
            | Self::Registration { status, .. }
            | Self::Introspection { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` for errors that signal missing setup rather than a
    /// transient failure. Callers should fix configuration instead of retrying.
    #[must_use]
    pub fn is_fatal_setup_error(&self) -> bool {
        matches!(
            self,
            Self::NoClient { .. }
                | Self::NoSigningKey
                | Self::UnknownKeyId { .. }
                | Self::NoKeysConfigured
                | Self::UnknownServer { .. }
                | Self::Configuration { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Discovery { .. } | Self::KeyFetch { .. } | Self::Registration { .. } => {
                ErrorCategory::Upstream
            }
            Self::TokenRequest { .. } | Self::Introspection { .. } => ErrorCategory::Token,
            Self::NoSigningKey
            | Self::UnknownKeyId { .. }
            | Self::InvalidKey { .. }
            | Self::Signing { .. } => ErrorCategory::KeyMaterial,
            Self::InvalidSignature { .. } => ErrorCategory::Validation,
            Self::NoClient { .. }
            | Self::NoKeysConfigured
            | Self::UnknownServer { .. }
            | Self::InvalidUrl { .. }
            | Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Storage { .. } => ErrorCategory::Storage,
        }
    }
}

/// Categories of errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Remote server could not be reached or misbehaved.
    Upstream,
    /// Token exchange or introspection failures.
    Token,
    /// Problems with local key material.
    KeyMaterial,
    /// Token validation failures.
    Validation,
    /// Missing or invalid setup.
    Configuration,
    /// Credential store failures.
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream => write!(f, "upstream"),
            Self::Token => write!(f, "token"),
            Self::KeyMaterial => write!(f, "key_material"),
            Self::Validation => write!(f, "validation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Storage => write!(f, "storage"),
        }
    }
}
