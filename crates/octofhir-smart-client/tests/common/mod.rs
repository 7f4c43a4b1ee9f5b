//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use jsonwebtoken::{Algorithm, Header};
use octofhir_smart_client::{
    ClientConfig, HttpConfig, Jwk, KeySet, MemoryCredentialStore, ServerMetadata, TokenClient,
};
use rsa::RsaPrivateKey;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Two RSA keys shared by every test in a binary; generation is slow.
pub fn rsa_key(index: usize) -> RsaPrivateKey {
    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::rngs::OsRng;
        (0..2)
            .map(|_| RsaPrivateKey::new(&mut rng, 2048).unwrap())
            .collect()
    })[index]
        .clone()
}

pub fn signing_jwk(kid: &str, index: usize) -> Jwk {
    Jwk::from_rsa_private_key(kid, &rsa_key(index))
}

/// The local identity used by test clients.
pub fn client_keys() -> KeySet {
    KeySet::from_keys(vec![signing_jwk("client-key", 0)])
}

/// The key a mock server signs its tokens with.
pub fn server_keys() -> KeySet {
    KeySet::from_keys(vec![signing_jwk("server-key", 1)])
}

pub fn http_config() -> HttpConfig {
    HttpConfig {
        allow_http: true,
        ..HttpConfig::default()
    }
}

pub fn client_with(config: ClientConfig) -> TokenClient {
    TokenClient::new(
        client_keys(),
        Arc::new(MemoryCredentialStore::new()),
        config,
        http_config(),
    )
    .unwrap()
}

pub fn client() -> TokenClient {
    client_with(ClientConfig::default())
}

pub fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Metadata pointing every endpoint at `server`.
pub fn metadata(server: &MockServer) -> ServerMetadata {
    ServerMetadata::new(format!("{}/token", server.uri()))
        .with_registration_endpoint(format!("{}/register", server.uri()))
        .with_jwks_uri(format!("{}/jwks", server.uri()))
}

pub fn token_response(access_token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "scope": "system/*.read"
    }))
}

pub fn registration_response(client_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(serde_json::json!({
        "client_id": client_id,
        "client_name": "octofhir-smart-client",
        "token_endpoint_auth_method": "client_credentials"
    }))
}

pub async fn mount_discovery(server: &MockServer) {
    let body = serde_json::to_value(metadata(server)).unwrap();
    Mock::given(method("GET"))
        .and(path("/.well-known/smart-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_jwks(server: &MockServer, keys: &KeySet, times: u64) {
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(keys.public_keys()))
        .expect(times)
        .mount(server)
        .await;
}

/// Signs a token the way a remote server would.
pub fn server_token(jwk: &Jwk, claims: serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS384);
    header.kid = jwk.kid.clone();
    jsonwebtoken::encode(&header, &claims, &jwk.encoding_key().unwrap()).unwrap()
}

/// Decodes an `application/x-www-form-urlencoded` body into ordered pairs.
pub fn form_pairs(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}
