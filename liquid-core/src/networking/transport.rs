//! Request transport for queued events and configuration pulls
//!
//! [`Transport`] is the seam between the flush engine and the network. The
//! production implementation, [`HttpTransport`], issues exactly one request
//! per call and reports any HTTP status as a result; only failures where no
//! status could be obtained (DNS, refused connection, timeout, unreadable
//! body) are errors.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::config::NetworkingConfig;
use crate::error::{Error, Result};

use super::event::HttpMethod;

/// Response of a body-less fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single-request transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` to `endpoint` with `method`, returning the HTTP status
    async fn send(&self, body: Vec<u8>, endpoint: &str, method: HttpMethod) -> Result<u16>;

    /// GET `endpoint` without a body
    async fn fetch(&self, endpoint: &str) -> Result<FetchResponse>;
}

/// What a flush cycle does with a group after its request completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 2xx: remove from the queue
    Delivered,
    /// Permanent client error: remove from the queue without retrying
    Rejected,
    /// Server error, throttling or timeout: keep for the next cycle
    Retry,
}

/// Map an HTTP status to the queue's retention policy
///
/// 4xx is permanent except 408 (request timeout) and 429 (too many requests).
pub fn classify_status(status: u16) -> Delivery {
    match status {
        200..=299 => Delivery::Delivered,
        408 | 429 => Delivery::Retry,
        400..=499 => Delivery::Rejected,
        _ => Delivery::Retry,
    }
}

/// User agent sent with every request, e.g. `Liquid/0.1.0 (linux; x86_64) Rust`
pub fn user_agent() -> &'static str {
    static USER_AGENT_STRING: OnceLock<String> = OnceLock::new();
    USER_AGENT_STRING.get_or_init(|| {
        format!(
            "Liquid/{} ({}; {}) Rust",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    })
}

/// Join `endpoint` onto `base_url` unless it is already absolute
pub fn resolve_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// reqwest-backed transport authenticated with the client token
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `token` from configuration
    ///
    /// Returns an error if the token cannot be used as a header value or the
    /// client cannot be built.
    pub fn new(config: &NetworkingConfig, token: &str) -> Result<Self> {
        let base_url = config.server_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config(
                "networking.server_url is required".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(user_agent()));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| Error::Config(format!("invalid token: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>, endpoint: &str, method: HttpMethod) -> Result<u16> {
        let url = resolve_url(&self.base_url, endpoint);

        let response = self
            .http_client
            .request(method.into(), &url)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        tracing::trace!(%url, %method, status, "Request completed");
        Ok(status)
    }

    async fn fetch(&self, endpoint: &str) -> Result<FetchResponse> {
        let url = resolve_url(&self.base_url, endpoint);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response: {}", e)))?;

        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), Delivery::Delivered);
        assert_eq!(classify_status(204), Delivery::Delivered);
        assert_eq!(classify_status(400), Delivery::Rejected);
        assert_eq!(classify_status(401), Delivery::Rejected);
        assert_eq!(classify_status(404), Delivery::Rejected);
        assert_eq!(classify_status(408), Delivery::Retry);
        assert_eq!(classify_status(429), Delivery::Retry);
        assert_eq!(classify_status(500), Delivery::Retry);
        assert_eq!(classify_status(503), Delivery::Retry);
        assert_eq!(classify_status(304), Delivery::Retry);
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://api.lqd.io/collect/", "users/1/events"),
            "https://api.lqd.io/collect/users/1/events"
        );
        assert_eq!(
            resolve_url("https://api.lqd.io/collect", "/session"),
            "https://api.lqd.io/collect/session"
        );
        assert_eq!(
            resolve_url("https://api.lqd.io/collect", "https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_user_agent_is_stable() {
        let ua = user_agent();
        assert!(ua.starts_with("Liquid/"));
        assert!(ua.contains(std::env::consts::OS));
        assert_eq!(ua, user_agent());
    }

    #[test]
    fn test_transport_rejects_unusable_token() {
        let config = NetworkingConfig::default();
        assert!(HttpTransport::new(&config, "bad\ntoken").is_err());
        assert!(HttpTransport::new(&config, "good-token").is_ok());
    }

    #[test]
    fn test_transport_requires_server_url() {
        let config = NetworkingConfig {
            server_url: "/".to_string(),
            ..Default::default()
        };
        assert!(HttpTransport::new(&config, "t").is_err());
    }

    #[test]
    fn test_fetch_response_success() {
        let ok = FetchResponse {
            status: 200,
            body: vec![],
        };
        let missing = FetchResponse {
            status: 404,
            body: vec![],
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
