//! Thin HTTP layer shared by the token client and validator.
//!
//! Every outbound call goes through [`HttpClient`] so the scheme policy,
//! timeout and response size limit are applied uniformly. Failures come back
//! as [`HttpFailure`], which the caller turns into the [`SmartError`] variant
//! matching the operation it was performing.

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::SmartResult;
use crate::config::HttpConfig;
use crate::error::SmartError;

/// Why an HTTP exchange failed.
#[derive(Debug)]
pub enum HttpFailure {
    /// The URL was malformed or used a disallowed scheme.
    Url(SmartError),

    /// The request never produced a response.
    Transport(String),

    /// The server answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response exceeded the configured size limit.
    TooLarge {
        /// The configured limit.
        max_size: usize,
    },

    /// The body was not the expected JSON document.
    Parse(String),
}

impl HttpFailure {
    /// Upstream status, when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Converts into a [`SmartError`], building operation-specific variants
    /// with `make(status, message)`.
    pub fn into_error(self, make: impl FnOnce(Option<u16>, String) -> SmartError) -> SmartError {
        match self {
            Self::Url(err) => make(None, err.to_string()),
            Self::Transport(message) => make(None, message),
            Self::Status { status, body } => make(Some(status), body),
            Self::TooLarge { max_size } => make(
                None,
                format!("Response exceeds maximum size of {} bytes", max_size),
            ),
            Self::Parse(message) => make(None, message),
        }
    }
}

/// reqwest wrapper applying [`HttpConfig`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Builds a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the underlying client cannot be created.
    pub fn new(config: HttpConfig) -> SmartResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SmartError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Parses `raw` and checks its scheme against the policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the URL does not parse, or is not HTTPS while
    /// `allow_http` is off.
    pub fn parse_url(&self, raw: &str) -> SmartResult<Url> {
        let url = Url::parse(raw).map_err(|e| SmartError::invalid_url(raw, e.to_string()))?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.config.allow_http => Ok(url),
            other => Err(SmartError::invalid_url(
                raw,
                format!("scheme '{}' is not allowed (only HTTPS)", other),
            )),
        }
    }

    /// GETs a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpFailure> {
        let url = self.parse_url(url).map_err(HttpFailure::Url)?;
        let request = self
            .client
            .get(url.as_str())
            .header("Accept", "application/json");
        self.execute(request).await
    }

    /// POSTs a JSON body and parses a JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, HttpFailure> {
        let url = self.parse_url(url).map_err(HttpFailure::Url)?;
        let body = serde_json::to_vec(body).map_err(|e| HttpFailure::Parse(e.to_string()))?;
        let request = self
            .client
            .post(url.as_str())
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(body);
        self.execute(request).await
    }

    /// POSTs an `application/x-www-form-urlencoded` body, preserving the
    /// parameter order, and parses a JSON response.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, HttpFailure> {
        let url = self.parse_url(url).map_err(HttpFailure::Url)?;
        let body = encode_form(params);
        let request = self
            .client
            .post(url.as_str())
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body);
        self.execute(request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, HttpFailure> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpFailure::Transport(e.to_string()))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_response_size
        {
            return Err(HttpFailure::TooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HttpFailure::Transport(e.to_string()))?;

        if bytes.len() > self.config.max_response_size {
            return Err(HttpFailure::TooLarge {
                max_size: self.config.max_response_size,
            });
        }

        if !status.is_success() {
            return Err(HttpFailure::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| HttpFailure::Parse(e.to_string()))
    }
}

/// Encodes form parameters in the given order.
#[must_use]
pub fn encode_form(params: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(HttpConfig {
            allow_http: true,
            ..HttpConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_encode_form_keeps_order() {
        let body = encode_form(&[("b", "2 3"), ("a", ""), ("c", "x/y")]);
        assert_eq!(body, "b=2+3&a=&c=x%2Fy");
    }

    #[test]
    fn test_scheme_policy() {
        let strict = HttpClient::new(HttpConfig::default()).unwrap();
        assert!(strict.parse_url("https://a.example.com").is_ok());
        assert!(matches!(
            strict.parse_url("http://a.example.com"),
            Err(SmartError::InvalidUrl { .. })
        ));
        assert!(matches!(
            strict.parse_url("ftp://a.example.com"),
            Err(SmartError::InvalidUrl { .. })
        ));
        assert!(matches!(
            strict.parse_url("not a url"),
            Err(SmartError::InvalidUrl { .. })
        ));
        assert!(client().parse_url("http://localhost:8080").is_ok());
    }

    #[tokio::test]
    async fn test_get_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let value: serde_json::Value = client()
            .get_json(&format!("{}/doc", server.uri()))
            .await
            .unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn test_status_failure_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let failure = client()
            .post_form::<serde_json::Value>(
                &format!("{}/token", server.uri()),
                &[("grant_type", "client_credentials")],
            )
            .await
            .unwrap_err();

        assert_eq!(failure.status(), Some(401));
        let err = failure.into_error(SmartError::token_request);
        assert!(matches!(
            err,
            SmartError::TokenRequest { status: Some(401), ref body } if body == "invalid_client"
        ));
    }

    #[tokio::test]
    async fn test_response_too_large() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let http = HttpClient::new(HttpConfig {
            allow_http: true,
            max_response_size: 16,
            ..HttpConfig::default()
        })
        .unwrap();

        let failure = http
            .get_json::<serde_json::Value>(&server.uri())
            .await
            .unwrap_err();
        assert!(matches!(failure, HttpFailure::TooLarge { max_size: 16 }));
    }

    #[tokio::test]
    async fn test_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let failure = client()
            .get_json::<serde_json::Value>(&server.uri())
            .await
            .unwrap_err();
        assert!(matches!(failure, HttpFailure::Parse(_)));
        assert_eq!(failure.status(), None);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let failure = client()
            .get_json::<serde_json::Value>("http://127.0.0.1:1/unreachable")
            .await
            .unwrap_err();
        assert!(matches!(failure, HttpFailure::Transport(_)));
    }

    #[tokio::test]
    async fn test_url_failure_maps_to_operation_error() {
        let strict = HttpClient::new(HttpConfig::default()).unwrap();
        let err = strict
            .get_json::<serde_json::Value>("http://insecure.example.com")
            .await
            .unwrap_err()
            .into_error(SmartError::token_request);
        match err {
            SmartError::TokenRequest { status, body } => {
                assert_eq!(status, None);
                assert!(body.contains("insecure.example.com"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
