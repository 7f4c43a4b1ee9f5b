//! Calling side of SMART Backend Services.
//!
//! [`TokenClient`] holds this process's signing identity and obtains access
//! tokens from any number of remote servers:
//!
//! 1. A fresh cached token is returned without touching the network.
//! 2. Otherwise the server's metadata and this client's registration with it
//!    are loaded from the store, registering on the fly when the server
//!    offers dynamic registration.
//! 3. A signed client assertion is exchanged for a token at the token
//!    endpoint, and the result is cached.
//!
//! Token acquisition and registration are serialized per server, so
//! concurrent callers share one network exchange.

use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::SmartResult;
use crate::assertion;
use crate::config::{ClientConfig, HttpConfig, SmartClientConfig};
use crate::discovery::{fetch_key_set, fetch_metadata, normalize_server};
use crate::error::SmartError;
use crate::http::HttpClient;
use crate::jwk::KeySet;
use crate::keystore::{Keystore, VerifiedToken};
use crate::store::CredentialStore;
use crate::types::{
    CachedAccessToken, ClientRegistration, RegistrationOutcome, RegistrationRequest,
    ServerMetadata,
};

/// Grant type sent to token endpoints.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// One async mutex per server key, created on first use.
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// SMART Backend Services token client.
pub struct TokenClient {
    keys: KeySet,
    store: Arc<dyn CredentialStore>,
    config: ClientConfig,
    http: HttpClient,
    keystores: RwLock<HashMap<String, Arc<Keystore>>>,
    token_locks: KeyedLocks,
    registration_locks: KeyedLocks,
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("keys", &self.keys.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenClient {
    /// Creates a client signing with `keys` and persisting to `store`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn new(
        keys: KeySet,
        store: Arc<dyn CredentialStore>,
        config: ClientConfig,
        http: HttpConfig,
    ) -> SmartResult<Self> {
        Ok(Self {
            keys,
            store,
            config,
            http: HttpClient::new(http)?,
            keystores: RwLock::new(HashMap::new()),
            token_locks: KeyedLocks::default(),
            registration_locks: KeyedLocks::default(),
        })
    }

    /// Creates a client from the `client` and `http` sections of a full
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn from_config(
        keys: KeySet,
        store: Arc<dyn CredentialStore>,
        config: &SmartClientConfig,
    ) -> SmartResult<Self> {
        Self::new(keys, store, config.client.clone(), config.http.clone())
    }

    /// The local signing key set.
    #[must_use]
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// The credential store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Client settings.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Adds a remote server.
    ///
    /// With `metadata` the record is stored as given and nothing is fetched.
    /// Without it the server's SMART configuration is discovered and stored,
    /// then its `jwks_uri` (if any) is fetched and the keys stored.
    ///
    /// # Errors
    ///
    /// - `Discovery` if `server` is not an allowed URL, or the configuration
    ///   cannot be fetched or parsed
    /// - `KeyFetch` if the keys cannot be fetched; the metadata is kept
    pub async fn add_server(
        &self,
        server: &str,
        metadata: Option<ServerMetadata>,
    ) -> SmartResult<ServerMetadata> {
        let server = normalize_server(server);

        match metadata {
            Some(metadata) => {
                self.store.add_server(&server, metadata.clone()).await?;
                self.keystores.write().await.remove(&server);
                tracing::info!(server = %server, "Added server with supplied metadata");
                Ok(metadata)
            }
            None => self.discover(&server).await,
        }
    }

    /// Re-discovers a server, replacing its stored metadata and keys and
    /// dropping the parsed verification keys held by this client.
    ///
    /// # Errors
    ///
    /// As [`add_server`](Self::add_server) without metadata.
    pub async fn reload_server(&self, server: &str) -> SmartResult<ServerMetadata> {
        self.discover(&normalize_server(server)).await
    }

    async fn discover(&self, server: &str) -> SmartResult<ServerMetadata> {
        let metadata = fetch_metadata(&self.http, server).await?;
        self.store.add_server(server, metadata.clone()).await?;
        self.keystores.write().await.remove(server);
        tracing::info!(server = %server, "Discovered server configuration");

        match &metadata.jwks_uri {
            Some(jwks_uri) => {
                let keys = fetch_key_set(&self.http, jwks_uri).await?;
                self.store.put_server_keys(server, keys).await?;
            }
            None => {
                tracing::debug!(server = %server, "No jwks_uri advertised, skipping key preload");
            }
        }

        Ok(metadata)
    }

    /// Registers this client with a server via dynamic client registration.
    ///
    /// Idempotent: an existing registration is returned unchanged. A server
    /// without a registration endpoint yields
    /// [`RegistrationOutcome::Unavailable`].
    ///
    /// # Errors
    ///
    /// - `UnknownServer` if the server has not been added
    /// - `Registration` if the endpoint rejects the request or is unreachable
    pub async fn register(&self, server: &str) -> SmartResult<RegistrationOutcome> {
        let server = normalize_server(server);

        if let Some(registration) = self.store.get_client_registration(&server).await? {
            return Ok(RegistrationOutcome::Registered(registration));
        }

        let _guard = self.registration_locks.lock(&server).await;

        if let Some(registration) = self.store.get_client_registration(&server).await? {
            return Ok(RegistrationOutcome::Registered(registration));
        }

        let metadata = self.server_metadata(&server).await?;
        let Some(endpoint) = metadata.registration_endpoint.as_deref() else {
            tracing::debug!(server = %server, "Server offers no dynamic registration");
            return Ok(RegistrationOutcome::Unavailable);
        };

        let request = RegistrationRequest::new(
            self.config.client_name_or_default(),
            &self.keys,
            self.config.jwks_uri.as_deref(),
        );

        let registration: ClientRegistration = self
            .http
            .post_json(endpoint, &request)
            .await
            .map_err(|failure| {
                let err = failure.into_error(SmartError::registration);
                tracing::warn!(
                    server = %server,
                    category = %err.category(),
                    error = %err,
                    "Client registration failed"
                );
                err
            })?;

        self.store
            .put_client_registration(&server, registration.clone())
            .await?;

        tracing::info!(
            server = %server,
            client_id = %registration.client_id,
            "Registered client"
        );

        Ok(RegistrationOutcome::Registered(registration))
    }

    /// Returns an access token for `server`, reusing a fresh cached one.
    ///
    /// `key_id` and `scopes` override the configured signing key and scopes
    /// for a new exchange; they do not affect cache reuse.
    ///
    /// # Errors
    ///
    /// - `UnknownServer` if the server has not been added
    /// - `NoClient` if no registration exists and none can be obtained
    /// - `Registration` if on-the-fly registration fails
    /// - `NoSigningKey`, `UnknownKeyId` or `InvalidKey` for local key problems
    /// - `TokenRequest` if the token endpoint fails or rejects the assertion
    pub async fn request_access_token(
        &self,
        server: &str,
        key_id: Option<&str>,
        scopes: Option<&str>,
    ) -> SmartResult<CachedAccessToken> {
        let server = normalize_server(server);

        if let Some(token) = self.fresh_cached_token(&server).await? {
            tracing::debug!(server = %server, "Reusing cached access token");
            return Ok(token);
        }

        let _guard = self.token_locks.lock(&server).await;

        if let Some(token) = self.fresh_cached_token(&server).await? {
            tracing::debug!(server = %server, "Access token obtained by concurrent request");
            return Ok(token);
        }

        let metadata = self.server_metadata(&server).await?;

        let registration = match self.store.get_client_registration(&server).await? {
            Some(registration) => Some(registration),
            None if metadata.supports_registration() => {
                self.register(&server).await?.into_registration()
            }
            None => None,
        };

        let Some(registration) = registration else {
            return Err(SmartError::no_client(&server));
        };

        let assertion = self.generate_assertion(
            &registration.client_id,
            &metadata.token_endpoint,
            key_id,
        )?;

        let scopes = scopes.or(self.config.scopes.as_deref()).unwrap_or_default();
        let params = [
            ("client_assertion", assertion.as_str()),
            (
                "client_assertion_type",
                self.config.client_assertion_type.as_str(),
            ),
            ("grant_type", CLIENT_CREDENTIALS_GRANT),
            ("scopes", scopes),
        ];

        tracing::debug!(
            server = %server,
            token_endpoint = %metadata.token_endpoint,
            "Requesting access token"
        );

        let token: CachedAccessToken = self
            .http
            .post_form(&metadata.token_endpoint, &params)
            .await
            .map_err(|failure| {
                let err = failure.into_error(SmartError::token_request);
                tracing::warn!(
                    server = %server,
                    category = %err.category(),
                    error = %err,
                    "Token request failed"
                );
                err
            })?;

        let token = token.with_issued_at(OffsetDateTime::now_utc().unix_timestamp());
        self.store.put_access_token(&server, token.clone()).await?;

        tracing::info!(
            server = %server,
            expires_in = token.expires_in,
            "Obtained access token"
        );

        Ok(token)
    }

    /// Returns the cached token for `server` whether or not it has expired,
    /// requesting a new one only when nothing is cached.
    ///
    /// Unlike [`request_access_token`](Self::request_access_token) this does
    /// not check expiry. Callers that need a usable token should use that.
    ///
    /// # Errors
    ///
    /// As [`request_access_token`](Self::request_access_token).
    pub async fn request_token(&self, server: &str) -> SmartResult<CachedAccessToken> {
        if let Some(token) = self.store.get_access_token(server).await? {
            return Ok(token);
        }
        self.request_access_token(server, None, None).await
    }

    /// Signs a client assertion with the local keys.
    ///
    /// `key_id` falls back to the configured signing key, then to the first
    /// signature key.
    ///
    /// # Errors
    ///
    /// `NoSigningKey`, `UnknownKeyId`, `InvalidKey` or `Signing`.
    pub fn generate_assertion(
        &self,
        client_id: &str,
        audience: &str,
        key_id: Option<&str>,
    ) -> SmartResult<String> {
        let key_id = key_id.or(self.config.signing_key_id.as_deref());
        assertion::generate_assertion(&self.keys, client_id, audience, key_id)
    }

    /// Verifies the signature of a token issued by `server`.
    ///
    /// Verification keys come from this client's parsed cache, then the
    /// store, then the server's `jwks_uri` (which is stored on success).
    /// Expiry is not checked.
    ///
    /// # Errors
    ///
    /// - `NoKeysConfigured` if the server has no stored keys and no `jwks_uri`
    /// - `KeyFetch` if fetching the keys fails
    /// - `InvalidSignature` if verification fails
    pub async fn validate_received_token(
        &self,
        server: &str,
        token: &str,
    ) -> SmartResult<VerifiedToken> {
        let server = normalize_server(server);
        let keystore = self.server_keystore(&server).await?;
        keystore.verify(token)
    }

    /// Drops cached access tokens for one server, or all servers.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn clear_tokens(&self, server: Option<&str>) -> SmartResult<()> {
        self.store.clear_tokens(server).await
    }

    async fn fresh_cached_token(&self, server: &str) -> SmartResult<Option<CachedAccessToken>> {
        Ok(self
            .store
            .get_access_token(server)
            .await?
            .filter(CachedAccessToken::is_fresh))
    }

    async fn server_metadata(&self, server: &str) -> SmartResult<ServerMetadata> {
        self.store
            .get_server_metadata(server)
            .await?
            .ok_or_else(|| SmartError::unknown_server(server))
    }

    async fn server_keystore(&self, server: &str) -> SmartResult<Arc<Keystore>> {
        if let Some(keystore) = self.keystores.read().await.get(server) {
            return Ok(Arc::clone(keystore));
        }

        let keys = match self.store.get_server_keys(server).await? {
            Some(keys) => keys,
            None => {
                let jwks_uri = self
                    .store
                    .get_server_metadata(server)
                    .await?
                    .and_then(|metadata| metadata.jwks_uri)
                    .ok_or(SmartError::NoKeysConfigured)?;

                let keys = fetch_key_set(&self.http, &jwks_uri).await?;
                self.store.put_server_keys(server, keys.clone()).await?;
                keys
            }
        };

        let keystore = Arc::new(Keystore::from_key_set(&keys));
        tracing::debug!(server = %server, keys = keystore.len(), "Loaded verification keys");

        self.keystores
            .write()
            .await
            .insert(server.to_string(), Arc::clone(&keystore));

        Ok(keystore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::test_keys::signing_jwk;
    use crate::store::MemoryCredentialStore;

    fn client() -> TokenClient {
        TokenClient::new(
            KeySet::from_keys(vec![signing_jwk("key-1", 0), signing_jwk("key-2", 1)]),
            Arc::new(MemoryCredentialStore::new()),
            ClientConfig::default(),
            HttpConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_keyed_locks_are_per_key() {
        let locks = KeyedLocks::default();
        let _a = locks.lock("a").await;
        // A different key must not block.
        let _b = locks.lock("b").await;
        assert!(locks.locks.lock().await.len() == 2);
    }

    #[tokio::test]
    async fn test_add_server_with_metadata_normalizes() {
        let client = client();
        client
            .add_server("https://a.example.com/", Some(ServerMetadata::new("https://a.example.com/token")))
            .await
            .unwrap();

        assert!(
            client
                .store()
                .get_server_metadata("https://a.example.com")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_unknown_server() {
        let client = client();
        let err = client
            .request_access_token("https://nowhere.example.com", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartError::UnknownServer { .. }));

        let err = client.register("https://nowhere.example.com").await.unwrap_err();
        assert!(matches!(err, SmartError::UnknownServer { .. }));
    }

    #[tokio::test]
    async fn test_registration_unavailable() {
        let client = client();
        client
            .add_server("https://a", Some(ServerMetadata::new("https://a/token")))
            .await
            .unwrap();
        assert_eq!(
            client.register("https://a").await.unwrap(),
            RegistrationOutcome::Unavailable
        );
    }

    #[tokio::test]
    async fn test_configured_signing_key_used() {
        let client = TokenClient::new(
            KeySet::from_keys(vec![signing_jwk("key-1", 0), signing_jwk("key-2", 1)]),
            Arc::new(MemoryCredentialStore::new()),
            ClientConfig {
                signing_key_id: Some("key-2".to_string()),
                ..ClientConfig::default()
            },
            HttpConfig::default(),
        )
        .unwrap();

        let token = client.generate_assertion("c", "https://a/token", None).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key-2"));

        let token = client
            .generate_assertion("c", "https://a/token", Some("key-1"))
            .unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key-1"));
    }

    #[tokio::test]
    async fn test_validate_without_keys() {
        let client = client();
        client
            .add_server("https://a", Some(ServerMetadata::new("https://a/token")))
            .await
            .unwrap();
        let err = client
            .validate_received_token("https://a", "x.y.z")
            .await
            .unwrap_err();
        assert!(matches!(err, SmartError::NoKeysConfigured));
    }
}
