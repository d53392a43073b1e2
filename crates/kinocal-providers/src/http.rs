//! HTTP client shared by the source adapters.
//!
//! A thin layer over `reqwest` that turns every transport failure and every
//! non-success status into a [`ProviderError`] with the right code, so
//! adapters only ever see response bodies or classified errors.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{ProviderError, ProviderResult};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl HttpConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("kinocal/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client returning response bodies as text.
///
/// Cheap to clone: `reqwest::Client` is reference counted internally.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: &HttpConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;
        Ok(Self { client })
    }

    /// Performs a GET request.
    pub async fn get_text(&self, url: &str) -> ProviderResult<String> {
        debug!(url = %url, "GET");
        self.send(self.client.get(url)).await
    }

    /// Performs a GET request with extra headers (e.g. an API token).
    pub async fn get_text_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> ProviderResult<String> {
        debug!(url = %url, "GET");
        let headers = header_map(headers)?;
        self.send(self.client.get(url).headers(headers)).await
    }

    /// Performs a POST request with an `application/x-www-form-urlencoded` body.
    pub async fn post_form_text<F>(&self, url: &str, form: &F) -> ProviderResult<String>
    where
        F: Serialize + ?Sized,
    {
        debug!(url = %url, "POST form");
        self.send(self.client.post(url).form(form)).await
    }

    /// Performs a POST request with a JSON body.
    pub async fn post_json_text<B>(&self, url: &str, body: &B) -> ProviderResult<String>
    where
        B: Serialize + ?Sized,
    {
        debug!(url = %url, "POST json");
        let body = serde_json::to_string(body).map_err(|e| {
            ProviderError::internal(format!("failed to encode request body: {}", e)).with_source(e)
        })?;
        self.send(
            self.client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(body),
        )
        .await
    }

    /// Issues a HEAD request and reports whether `url` exists.
    ///
    /// Redirects are followed. `Some(true)` on a 2xx, `Some(false)` on 404 or
    /// 410. Transport errors and every other status give `None`: the server
    /// did not say either way.
    pub async fn probe(&self, url: &str) -> Option<bool> {
        match self.client.head(url).send().await {
            Ok(response) => {
                let exists = head_answer(response.status());
                trace!(url = %url, status = %response.status(), ?exists, "probe");
                exists
            }
            Err(e) => {
                trace!(url = %url, error = %e, "probe failed");
                None
            }
        }
    }

    async fn send(&self, request: RequestBuilder) -> ProviderResult<String> {
        let response = request.send().await.map_err(transport_error)?;
        handle_response(response).await
    }
}

fn header_map(headers: &[(&str, &str)]) -> ProviderResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ProviderError::configuration(format!("invalid header name {:?}: {}", name, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ProviderError::configuration(format!("invalid value for header {}: {}", name, e))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

fn head_answer(status: StatusCode) -> Option<bool> {
    match status {
        s if s.is_success() => Some(true),
        StatusCode::NOT_FOUND | StatusCode::GONE => Some(false),
        _ => None,
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("request timed out: {}", e)).with_source(e)
    } else {
        ProviderError::network(format!("request failed: {}", e)).with_source(e)
    }
}

/// Maps a response to its body or a classified error.
async fn handle_response(response: Response) -> ProviderResult<String> {
    let status = response.status();
    trace!(status = %status, url = %response.url(), "received response");

    match status {
        s if s.is_success() => response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::authentication(
            format!("credential rejected ({})", status),
        )),
        StatusCode::NOT_FOUND => Err(ProviderError::not_found(format!(
            "{} not found",
            response.url()
        ))),
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::rate_limited("too many requests")),
        StatusCode::BAD_REQUEST => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::bad_request(format!(
                "request rejected: {}",
                truncate(&body)
            )))
        }
        s if s.is_server_error() => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::server(format!(
                "server error ({}): {}",
                s,
                truncate(&body)
            )))
        }
        s => {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %s, body = %truncate(&body), "unexpected response status");
            Err(ProviderError::invalid_response(format!(
                "unexpected status {}",
                s
            )))
        }
    }
}

/// Keeps error messages readable when upstreams answer with whole HTML pages.
fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("kinocal/"));
    }

    #[test]
    fn config_builder() {
        let config = HttpConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn client_creation() {
        assert!(HttpClient::new(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn invalid_header_is_configuration_error() {
        let err = header_map(&[("VeeziAccessToken", "bad\nvalue")]).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert!(header_map(&[("VeeziAccessToken", "abc123")]).is_ok());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(150);
        let cut = truncate(&long);
        assert!(cut.len() <= 200);
        assert!(long.starts_with(cut));
        assert_eq!(truncate("short"), "short");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = HttpClient::new(&HttpConfig::default().with_timeout(Duration::from_secs(2)))
            .unwrap();
        let err = client.get_text("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(client.probe("http://127.0.0.1:9/").await, None);
    }

    #[test]
    fn only_existence_statuses_are_answers() {
        assert_eq!(head_answer(StatusCode::OK), Some(true));
        assert_eq!(head_answer(StatusCode::NO_CONTENT), Some(true));
        assert_eq!(head_answer(StatusCode::NOT_FOUND), Some(false));
        assert_eq!(head_answer(StatusCode::GONE), Some(false));
        assert_eq!(head_answer(StatusCode::TOO_MANY_REQUESTS), None);
        assert_eq!(head_answer(StatusCode::FORBIDDEN), None);
        assert_eq!(head_answer(StatusCode::SERVICE_UNAVAILABLE), None);
    }
}
