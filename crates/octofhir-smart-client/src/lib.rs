//! # octofhir-smart-client
//!
//! SMART on FHIR Backend Services client and bearer token validator.
//!
//! This crate provides:
//! - A token client that discovers remote servers, registers itself
//!   dynamically and exchanges signed JWT assertions for access tokens
//! - Expiry-aware access token caching with per-server single-flight
//! - A token validator that checks bearer tokens against a JWKS or through
//!   the issuer's introspection endpoint
//! - Credential stores for per-server metadata, registrations, keys and tokens
//!
//! ## Modules
//!
//! - [`client`] - Calling side: discovery, registration, token exchange
//! - [`validator`] - Receiving side: local and remote token validation
//! - [`store`] - Credential persistence (in-memory and JSON file)
//! - [`assertion`] - RS384 client assertions
//! - [`jwk`] - JSON Web Keys and key sets
//! - [`keystore`] - Parsed verification keys and signature checks
//! - [`discovery`] - SMART configuration and JWKS fetching
//! - [`config`] - Client, HTTP and validator configuration
//! - [`types`] - Records exchanged with remote servers
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_smart_client::prelude::*;
//!
//! let store = Arc::new(MemoryCredentialStore::new());
//! let client = TokenClient::new(keys, store, ClientConfig::default(), HttpConfig::default())?;
//!
//! client.add_server("https://fhir.example.com", None).await?;
//! let token = client
//!     .request_access_token("https://fhir.example.com", None, Some("system/*.read"))
//!     .await?;
//! ```

pub mod assertion;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod jwk;
pub mod keystore;
pub mod store;
pub mod types;
pub mod validator;

pub use client::TokenClient;
pub use config::{ClientConfig, ConfigError, HttpConfig, SmartClientConfig, ValidatorConfig};
pub use error::{ErrorCategory, SmartError};
pub use jwk::{Jwk, KeySet};
pub use keystore::{Keystore, VerifiedToken};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{
    CachedAccessToken, ClientRegistration, Introspection, IntrospectionResponse,
    RegistrationOutcome, ServerMetadata,
};
pub use validator::TokenValidator;

/// Type alias for client and validator results.
pub type SmartResult<T> = Result<T, SmartError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_smart_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::SmartResult;
    pub use crate::client::TokenClient;
    pub use crate::config::{
        ClientConfig, ConfigError, HttpConfig, SmartClientConfig, ValidatorConfig,
    };
    pub use crate::error::{ErrorCategory, SmartError};
    pub use crate::jwk::{Jwk, KeySet};
    pub use crate::keystore::VerifiedToken;
    pub use crate::store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
    pub use crate::types::{
        CachedAccessToken, ClientRegistration, Introspection, RegistrationOutcome, ServerMetadata,
    };
    pub use crate::validator::TokenValidator;
}
