//! JSON file backed credential store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialStore, ServerRecord, StoreState, clear_tokens_in};
use crate::SmartResult;
use crate::discovery::normalize_server;
use crate::error::SmartError;
use crate::jwk::KeySet;
use crate::types::{CachedAccessToken, ClientRegistration, ServerMetadata};

/// Credential store persisted as a single JSON document.
///
/// The file is read once at [`open`](Self::open) and rewritten after every
/// mutation by writing a sibling temporary file and renaming it over the
/// original, so a crash never leaves a half-written document. The store
/// assumes it is the only writer of the file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl FileCredentialStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> SmartResult<Self> {
        let path = path.into();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                SmartError::storage(format!("Corrupt store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Credential store not found, starting empty");
                StoreState::new()
            }
            Err(e) => {
                return Err(SmartError::storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T>(&self, server: &str, f: impl FnOnce(&ServerRecord) -> Option<T>) -> Option<T> {
        let state = self.state.read().await;
        state.get(&normalize_server(server)).and_then(f)
    }

    /// Applies `f` to a copy of the state, persists it, then publishes it.
    /// In-memory state only changes once the file write succeeded.
    async fn update(&self, f: impl FnOnce(&mut StoreState)) -> SmartResult<()> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        f(&mut next);
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn update_record(&self, server: &str, f: impl FnOnce(&mut ServerRecord)) -> SmartResult<()> {
        let key = normalize_server(server);
        self.update(|state| f(state.entry(key).or_default())).await
    }

    async fn persist(&self, state: &StoreState) -> SmartResult<()> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| SmartError::storage(format!("Failed to serialize store: {}", e)))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SmartError::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await.map_err(|e| {
            SmartError::storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            SmartError::storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
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
        self.update_record(server, |record| record.metadata = Some(metadata))
            .await
    }

    async fn get_server_metadata(&self, server: &str) -> SmartResult<Option<ServerMetadata>> {
        Ok(self.read(server, |record| record.metadata.clone()).await)
    }

    async fn put_client_registration(
        &self,
        server: &str,
        registration: ClientRegistration,
    ) -> SmartResult<()> {
        self.update_record(server, |record| record.registration = Some(registration))
            .await
    }

    async fn get_client_registration(
        &self,
        server: &str,
    ) -> SmartResult<Option<ClientRegistration>> {
        Ok(self.read(server, |record| record.registration.clone()).await)
    }

    async fn put_access_token(&self, server: &str, token: CachedAccessToken) -> SmartResult<()> {
        self.update_record(server, |record| record.token = Some(token))
            .await
    }

    async fn get_access_token(&self, server: &str) -> SmartResult<Option<CachedAccessToken>> {
        Ok(self.read(server, |record| record.token.clone()).await)
    }

    async fn put_server_keys(&self, server: &str, keys: KeySet) -> SmartResult<()> {
        self.update_record(server, |record| record.keys = Some(keys))
            .await
    }

    async fn get_cached_server_keys(&self, server: &str) -> SmartResult<Option<KeySet>> {
        Ok(self.read(server, |record| record.keys.clone()).await)
    }

    async fn clear_server_keys(&self, server: &str) -> SmartResult<()> {
        self.update_record(server, |record| record.keys = None)
            .await
    }

    async fn clear_tokens(&self, server: Option<&str>) -> SmartResult<()> {
        let server = server.map(normalize_server);
        self.update(|state| clear_tokens_in(state, server.as_deref()))
            .await
    }
}
