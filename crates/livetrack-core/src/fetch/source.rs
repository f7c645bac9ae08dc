use futures::future::BoxFuture;
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::{Client, Url};
use serde_json::Value;

use super::query::StatisticsQuery;
use crate::config::TrackerConfig;
use crate::models::FetchResponse;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid request url: {0}")]
    InvalidUrl(String),
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("Server responded {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::InvalidUrl(_) => None,
            Self::Transport { url, .. } | Self::Status { url, .. } | Self::Decode { url, .. } => {
                Some(url)
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Anything that can answer a statistics query.
pub trait StatisticsSource: Send + Sync {
    fn fetch<'a>(&'a self, query: &'a StatisticsQuery)
        -> BoxFuture<'a, Result<FetchResponse, FetchError>>;
}

/// `GET {base}/{resource}?...` against the statistics API.
#[derive(Debug, Clone)]
pub struct HttpStatisticsSource {
    client: Client,
    base_url: String,
    resource: String,
    language: String,
}

impl HttpStatisticsSource {
    pub fn new(base_url: impl Into<String>, resource: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            resource: resource.into(),
            language: language.into(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(&config.api_base_url, &config.resource, &config.language)
    }

    pub fn url_for(&self, query: &StatisticsQuery) -> Result<Url, FetchError> {
        let endpoint = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.resource.trim_start_matches('/')
        );
        Url::parse_with_params(&endpoint, query.params())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", endpoint, e)))
    }

    async fn fetch_inner(&self, query: &StatisticsQuery) -> Result<FetchResponse, FetchError> {
        let url = self.url_for(query)?;
        let url_text = url.to_string();
        tracing::debug!(url = %url_text, "Fetching statistics");

        let response = self
            .client
            .get(url)
            .header(ACCEPT_LANGUAGE, self.language.as_str())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url_text.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            // Prefer the server's own message when the body carries one
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(FetchError::Status {
                url: url_text,
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<FetchResponse>()
            .await
            .map_err(|e| FetchError::Decode {
                url: url_text,
                message: e.to_string(),
            })
    }
}

impl StatisticsSource for HttpStatisticsSource {
    fn fetch<'a>(
        &'a self,
        query: &'a StatisticsQuery,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        Box::pin(self.fetch_inner(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterKey, FilterState};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status_line: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (format!("http://{}/api", addr), handle)
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    fn query() -> StatisticsQuery {
        let filters = FilterState::new()
            .with(FilterKey::OrganizationId, "2")
            .with(FilterKey::MonitorId, "7");
        StatisticsQuery::from_filters(&filters, 1700000000000)
    }

    #[test]
    fn test_url_includes_only_set_params() {
        let source = HttpStatisticsSource::new("http://example.test/api/", "refada-statistics", "ar");
        let url = source.url_for(&query()).unwrap();

        assert_eq!(
            url.as_str(),
            "http://example.test/api/refada-statistics?monitor_id=7&organization_id=2&_t=1700000000000"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let source = HttpStatisticsSource::new("not a url", "refada-statistics", "ar");
        assert!(matches!(source.url_for(&query()), Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_decodes_data_envelope() {
        let (base, server) = serve_once("200 OK", r#"{"data":{"sectors_table":[{"id":1}]}}"#).await;
        let source = HttpStatisticsSource::new(base, "refada-statistics", "en").with_client(local_client());

        let response = source.fetch(&query()).await.unwrap();
        let snapshot = response.into_snapshot().unwrap();
        assert_eq!(snapshot.record_count("sectors_table"), 1);

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /api/refada-statistics?monitor_id=7&organization_id=2&_t="));
        assert!(request.contains("accept-language: en"));
    }

    #[tokio::test]
    async fn test_fetch_surfaces_server_message() {
        let (base, _server) = serve_once("500 Internal Server Error", r#"{"message":"db down"}"#).await;
        let source = HttpStatisticsSource::new(base, "refada-statistics", "ar").with_client(local_client());

        let error = source.fetch(&query()).await.unwrap_err();
        assert_eq!(error.status(), Some(500));
        assert!(error.to_string().contains("db down"));
    }
}
