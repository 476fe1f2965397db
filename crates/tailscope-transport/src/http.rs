//! reqwest-backed [`FetchTransport`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use tailscope_core::{ConfigError, Cursor, FetchBatch, FetchError, FetchRequest, FetchTransport};

use crate::wire::{classify_status, decode_batch, map_request_error};

/// Path of the event stream endpoint on a deployment
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/stream_events";

/// Per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Base URL of the deployment, e.g. `https://happy-otter-123.example.cloud`
    pub deployment_url: String,
    pub endpoint_path: String,
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            deployment_url: String::new(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HttpTransportConfig {
    pub fn new(deployment_url: impl Into<String>) -> Self {
        Self {
            deployment_url: deployment_url.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Fetches event batches from a deployment over HTTP
///
/// Each fetch is a single `GET` with the cursor as a query parameter and the
/// token as a bearer credential.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, ConfigError> {
        let raw = format!(
            "{}/{}",
            config.deployment_url.trim_end_matches('/'),
            config.endpoint_path.trim_start_matches('/')
        );
        let endpoint = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.deployment_url, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: unsupported scheme",
                config.deployment_url
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("tailscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL for a fetch; the first fetch carries no cursor
    pub fn request_url(&self, cursor: Option<&Cursor>) -> Url {
        let mut url = self.endpoint.clone();
        if let Some(cursor) = cursor {
            url.query_pairs_mut()
                .append_pair("cursor", &cursor.to_query_value());
        }
        url
    }

    async fn exchange(&self, request: FetchRequest<'_>) -> Result<FetchBatch, FetchError> {
        let url = self.request_url(request.cursor);
        trace!(%url, "Sending fetch");

        let response = self
            .client
            .get(url)
            .bearer_auth(request.auth_token.expose())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_request_error)?;

        if let Some(error) = classify_status(status, &body) {
            return Err(error);
        }

        let batch = decode_batch(&body)?;
        debug!(
            status = status.as_u16(),
            events = batch.events.len(),
            next_cursor = %batch.next_cursor,
            "Fetched batch"
        );
        Ok(batch)
    }
}

#[async_trait]
impl FetchTransport for HttpTransport {
    async fn fetch_batch(
        &self,
        request: FetchRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<FetchBatch, FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::aborted()),
            result = self.exchange(request) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("https://demo.example.cloud/")).unwrap();
        assert_eq!(
            transport.endpoint().as_str(),
            "https://demo.example.cloud/api/stream_events"
        );
    }

    #[test]
    fn test_request_url_carries_cursor() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("http://localhost:3210")).unwrap();

        let first = transport.request_url(None);
        assert_eq!(first.query(), None);

        let url = transport.request_url(Some(&Cursor::from(1234)));
        assert_eq!(url.query(), Some("cursor=1234"));

        let url = transport.request_url(Some(&Cursor::from("a b&c")));
        assert_eq!(url.query(), Some("cursor=a+b%26c"));
    }

    #[test]
    fn test_invalid_urls_rejected() {
        let err = HttpTransport::new(HttpTransportConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));

        let err = HttpTransport::new(HttpTransportConfig::new("ftp://files.example.com")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(ref m) if m.contains("scheme")));
    }

    #[test]
    fn test_config_defaults() {
        let config = HttpTransportConfig::new("https://x.example")
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(config.endpoint_path, DEFAULT_ENDPOINT_PATH);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(HttpTransportConfig::default().request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
