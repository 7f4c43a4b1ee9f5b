//! Per-server credential persistence.
//!
//! A [`CredentialStore`] keeps four records per remote server: its metadata,
//! this client's registration with it, its cached public keys and the last
//! access token it issued. Keys are server base URLs normalized with
//! [`normalize_server`](crate::discovery::normalize_server); implementations
//! normalize on every call so callers need not.
//!
//! Every write replaces the whole record value.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::SmartResult;
use crate::jwk::KeySet;
use crate::types::{CachedAccessToken, ClientRegistration, ServerMetadata};

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// Storage operations for per-server credential state.
///
/// # Example
///
/// ```ignore
/// use octofhir_smart_client::store::{CredentialStore, MemoryCredentialStore};
///
/// let store = MemoryCredentialStore::new();
/// store.add_server("https://fhir.example.com", metadata).await?;
/// if let Some(token) = store.get_access_token("https://fhir.example.com/").await? {
///     println!("cached token expires at {}", token.expires_at());
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Base URLs of every known server.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn servers(&self) -> SmartResult<Vec<String>>;

    /// Stores a server's metadata, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn put_server_metadata(&self, server: &str, metadata: ServerMetadata)
    -> SmartResult<()>;

    /// Loads a server's metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_server_metadata(&self, server: &str) -> SmartResult<Option<ServerMetadata>>;

    /// Stores this client's registration with a server.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn put_client_registration(
        &self,
        server: &str,
        registration: ClientRegistration,
    ) -> SmartResult<()>;

    /// Loads this client's registration with a server.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_client_registration(&self, server: &str)
    -> SmartResult<Option<ClientRegistration>>;

    /// Stores the latest access token from a server.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn put_access_token(&self, server: &str, token: CachedAccessToken) -> SmartResult<()>;

    /// Loads the cached access token for a server, fresh or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_access_token(&self, server: &str) -> SmartResult<Option<CachedAccessToken>>;

    /// Stores a server's fetched public keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn put_server_keys(&self, server: &str, keys: KeySet) -> SmartResult<()>;

    /// Loads the keys stored with [`put_server_keys`](Self::put_server_keys).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_cached_server_keys(&self, server: &str) -> SmartResult<Option<KeySet>>;

    /// Forgets a server's fetched public keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn clear_server_keys(&self, server: &str) -> SmartResult<()>;

    /// Drops cached access tokens for one server, or for all when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn clear_tokens(&self, server: Option<&str>) -> SmartResult<()>;

    /// Registers a server with its metadata. Keys fetched for earlier
    /// metadata are dropped along with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn add_server(&self, server: &str, metadata: ServerMetadata) -> SmartResult<()> {
        self.put_server_metadata(server, metadata).await?;
        self.clear_server_keys(server).await
    }

    /// Loads a server's verification keys: the fetched set if present,
    /// otherwise the key set embedded in its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_server_keys(&self, server: &str) -> SmartResult<Option<KeySet>> {
        if let Some(keys) = self.get_cached_server_keys(server).await? {
            return Ok(Some(keys));
        }
        Ok(self
            .get_server_metadata(server)
            .await?
            .and_then(|metadata| metadata.jwks))
    }
}

/// Everything stored for one server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Discovered or supplied metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ServerMetadata>,

    /// This client's registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<ClientRegistration>,

    /// Fetched public keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<KeySet>,

    /// Last issued access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<CachedAccessToken>,
}

/// The full contents of a store, keyed by normalized server URL.
pub(crate) type StoreState = BTreeMap<String, ServerRecord>;

/// Clears one server's token, or all tokens.
pub(crate) fn clear_tokens_in(state: &mut StoreState, server: Option<&str>) {
    match server {
        Some(server) => {
            if let Some(record) = state.get_mut(server) {
                record.token = None;
            }
        }
        None => state.values_mut().for_each(|record| record.token = None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_tokens_in() {
        let token = CachedAccessToken::new("t", 60);
        let mut state = StoreState::new();
        for server in ["https://a", "https://b"] {
            state.insert(
                server.to_string(),
                ServerRecord {
                    token: Some(token.clone()),
                    ..ServerRecord::default()
                },
            );
        }

        clear_tokens_in(&mut state, Some("https://a"));
        assert!(state["https://a"].token.is_none());
        assert!(state["https://b"].token.is_some());

        clear_tokens_in(&mut state, Some("https://unknown"));
        assert_eq!(state.len(), 2);

        clear_tokens_in(&mut state, None);
        assert!(state.values().all(|r| r.token.is_none()));
    }
}
