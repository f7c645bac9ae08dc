use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::Serialize;

use crate::fetch::FetchError;

/// A failed fetch as forwarded to the observability collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub url: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl ErrorReport {
    pub fn from_fetch_error(error: &FetchError) -> Self {
        let message = match error {
            FetchError::InvalidUrl(message)
            | FetchError::Transport { message, .. }
            | FetchError::Status { message, .. }
            | FetchError::Decode { message, .. } => message.clone(),
        };
        Self {
            url: error.url().map(str::to_string),
            status: error.status(),
            message,
        }
    }

    /// Plain-text body posted to the webhook.
    pub fn to_text(&self) -> String {
        let mut lines = vec!["Live tracking fetch failed".to_string()];
        if let Some(url) = &self.url {
            lines.push(format!("URL: {}", url));
        }
        if let Some(status) = self.status {
            lines.push(format!("Status: {}", status));
        }
        lines.push(format!("Message: {}", self.message));
        lines.join("\n")
    }
}

pub trait ErrorReporter: Send + Sync {
    fn report<'a>(&'a self, report: &'a ErrorReport) -> BoxFuture<'a, Result<()>>;
}

/// Reporter used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report<'a>(&'a self, _report: &'a ErrorReport) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Posts `{"text": ...}` to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookReporter {
    url: String,
    client: reqwest::Client,
}

impl WebhookReporter {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn post(&self, report: &ErrorReport) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": report.to_text() }))
            .send()
            .await
            .context("Failed to send error report")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Error webhook responded ({}): {}", status, error_text);
        }
        Ok(())
    }
}

impl ErrorReporter for WebhookReporter {
    fn report<'a>(&'a self, report: &'a ErrorReport) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.post(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn status_error() -> FetchError {
        FetchError::Status {
            url: "http://api.test/refada-statistics?organization_id=2".into(),
            status: 500,
            message: "db down".into(),
        }
    }

    #[test]
    fn test_report_text() {
        let report = ErrorReport::from_fetch_error(&status_error());
        assert_eq!(
            report.to_text(),
            "Live tracking fetch failed\nURL: http://api.test/refada-statistics?organization_id=2\nStatus: 500\nMessage: db down"
        );

        let invalid = ErrorReport::from_fetch_error(&FetchError::InvalidUrl("bad".into()));
        assert_eq!(invalid.to_text(), "Live tracking fetch failed\nMessage: bad");
    }

    #[tokio::test]
    async fn test_webhook_posts_text_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Read until the JSON body has arrived
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                .await
                .unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let reporter = WebhookReporter::new(format!("http://{}/hook", addr)).with_client(client);
        reporter
            .report(&ErrorReport::from_fetch_error(&status_error()))
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let payload: serde_json::Value = serde_json::from_str(body).unwrap();
        assert!(payload["text"].as_str().unwrap().contains("Status: 500"));
    }

    #[tokio::test]
    async fn test_noop_reporter() {
        assert!(NoopReporter
            .report(&ErrorReport::from_fetch_error(&status_error()))
            .await
            .is_ok());
    }
}
