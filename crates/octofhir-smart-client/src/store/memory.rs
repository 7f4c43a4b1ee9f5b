//! In-process credential store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialStore, ServerRecord, StoreState, clear_tokens_in};
use crate::SmartResult;
use crate::discovery::normalize_server;
use crate::jwk::KeySet;
use crate::types::{CachedAccessToken, ClientRegistration, ServerMetadata};

/// Credential store held in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: RwLock<StoreState>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<T>(&self, server: &str, f: impl FnOnce(&ServerRecord) -> Option<T>) -> Option<T> {
        let state = self.state.read().await;
        state.get(&normalize_server(server)).and_then(f)
    }

    async fn write(&self, server: &str, f: impl FnOnce(&mut ServerRecord)) {
        let mut state = self.state.write().await;
        f(state.entry(normalize_server(server)).or_default());
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn servers(&self) -> SmartResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .iter()
            .filter(|(_, record)| record.metadata.is_some())
            .map(|(server, _)| server.clone())
            .collect())
    }

    async fn put_server_metadata(
        &self,
        server: &str,
        metadata: ServerMetadata,
    ) -> SmartResult<()> {
        self.write(server, |record| record.metadata = Some(metadata))
            .await;
        Ok(())
    }

    async fn get_server_metadata(&self, server: &str) -> SmartResult<Option<ServerMetadata>> {
        Ok(self.read(server, |record| record.metadata.clone()).await)
    }

    async fn put_client_registration(
        &self,
        server: &str,
        registration: ClientRegistration,
    ) -> SmartResult<()> {
        self.write(server, |record| record.registration = Some(registration))
            .await;
        Ok(())
    }

    async fn get_client_registration(
        &self,
        server: &str,
    ) -> SmartResult<Option<ClientRegistration>> {
        Ok(self.read(server, |record| record.registration.clone()).await)
    }

    async fn put_access_token(&self, server: &str, token: CachedAccessToken) -> SmartResult<()> {
        self.write(server, |record| record.token = Some(token)).await;
        Ok(())
    }

    async fn get_access_token(&self, server: &str) -> SmartResult<Option<CachedAccessToken>> {
        Ok(self.read(server, |record| record.token.clone()).await)
    }

    async fn put_server_keys(&self, server: &str, keys: KeySet) -> SmartResult<()> {
        self.write(server, |record| record.keys = Some(keys)).await;
        Ok(())
    }

    async fn get_cached_server_keys(&self, server: &str) -> SmartResult<Option<KeySet>> {
        Ok(self.read(server, |record| record.keys.clone()).await)
    }

    async fn clear_server_keys(&self, server: &str) -> SmartResult<()> {
        self.write(server, |record| record.keys = None).await;
        Ok(())
    }

    async fn clear_tokens(&self, server: Option<&str>) -> SmartResult<()> {
        let mut state = self.state.write().await;
        let server = server.map(normalize_server);
        clear_tokens_in(&mut state, server.as_deref());
        Ok(())
    }
}
