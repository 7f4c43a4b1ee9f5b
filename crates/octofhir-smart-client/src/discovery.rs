//! SMART configuration discovery and remote key fetching.

use url::Url;

use crate::SmartResult;
use crate::error::SmartError;
use crate::http::{HttpClient, HttpFailure};
use crate::jwk::KeySet;
use crate::types::ServerMetadata;

/// Well-known path of the SMART configuration document.
pub const SMART_CONFIGURATION_PATH: &str = ".well-known/smart-configuration";

/// Normalizes a server base URL into its credential-store key.
///
/// A trailing slash is ignored so `https://a/` and `https://a` address the
/// same record.
#[must_use]
pub fn normalize_server(server: &str) -> String {
    server.trim_end_matches('/').to_string()
}

/// Builds `{server}/.well-known/smart-configuration`.
#[must_use]
pub fn build_discovery_url(server: &Url) -> Url {
    let mut discovery_url = server.clone();
    let path = server.path().trim_end_matches('/');
    discovery_url.set_path(&format!("{}/{}", path, SMART_CONFIGURATION_PATH));
    discovery_url
}

/// Fetches a server's SMART configuration.
///
/// # Errors
///
/// Returns `Discovery` if `server` is malformed or uses a disallowed scheme,
/// or the document is unreachable, non-2xx or unparseable.
pub async fn fetch_metadata(http: &HttpClient, server: &str) -> SmartResult<ServerMetadata> {
    let result = match http.parse_url(server) {
        Ok(base) => {
            let discovery_url = build_discovery_url(&base);
            tracing::debug!(server = %server, url = %discovery_url, "Fetching SMART configuration");
            http.get_json(discovery_url.as_str()).await
        }
        Err(err) => Err(HttpFailure::Url(err)),
    };

    result.map_err(|failure| {
        let err =
            failure.into_error(|status, message| SmartError::discovery(server, status, message));
        tracing::warn!(
            server = %server,
            category = %err.category(),
            error = %err,
            "SMART discovery failed"
        );
        err
    })
}

/// Fetches a JSON Web Key Set.
///
/// # Errors
///
/// Returns `KeyFetch` if `jwks_uri` is malformed or uses a disallowed scheme,
/// or the key set is unreachable, non-2xx or unparseable.
pub async fn fetch_key_set(http: &HttpClient, jwks_uri: &str) -> SmartResult<KeySet> {
    tracing::debug!(uri = %jwks_uri, "Fetching JWKS");

    let keys: KeySet = http.get_json(jwks_uri).await.map_err(|failure| {
        let err =
            failure.into_error(|status, message| SmartError::key_fetch(jwks_uri, status, message));
        tracing::warn!(
            uri = %jwks_uri,
            category = %err.category(),
            error = %err,
            "JWKS fetch failed"
        );
        err
    })?;

    tracing::debug!(uri = %jwks_uri, keys = keys.len(), "Fetched JWKS");
    Ok(keys)
}
