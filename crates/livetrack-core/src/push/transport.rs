use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::constants::push_events;

/// One Pusher protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, channel: Option<&str>, data: Value) -> Self {
        Self {
            event: event.into(),
            channel: channel.map(str::to_string),
            data,
        }
    }

    /// Parse one line. A `data` field holding JSON text is decoded in place.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let mut frame: Self = serde_json::from_str(line)?;
        if let Value::String(raw) = &frame.data {
            if let Ok(decoded) = serde_json::from_str::<Value>(raw) {
                frame.data = decoded;
            }
        }
        Ok(frame)
    }

    pub fn is_for(&self, channel: &str) -> bool {
        self.channel.as_deref() == Some(channel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("Missing push configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),
    #[error("Push transport error: {0}")]
    Transport(String),
    #[error("Push transport is not connected")]
    NotConnected,
}

impl From<std::io::Error> for PushError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A push connection that can be subscribed to one channel at a time.
pub trait PushTransport: Send {
    fn connect(&mut self) -> BoxFuture<'_, Result<(), PushError>>;

    fn subscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, Result<(), PushError>>;

    /// Next frame from the server. `Ok(None)` when the connection closed.
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<PushFrame>, PushError>>;

    fn unsubscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, Result<(), PushError>>;

    fn disconnect(&mut self) -> BoxFuture<'_, ()>;
}

/// Pusher frames as newline-delimited JSON over TCP.
pub struct RelayTransport {
    addr: String,
    app_key: String,
    cluster: String,
    reader: Option<Lines<BufReader<OwnedReadHalf>>>,
    writer: Option<OwnedWriteHalf>,
}

impl RelayTransport {
    pub fn new(addr: impl Into<String>, app_key: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            app_key: app_key.into(),
            cluster: cluster.into(),
            reader: None,
            writer: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    async fn send(&mut self, frame: &PushFrame) -> Result<(), PushError> {
        let writer = self.writer.as_mut().ok_or(PushError::NotConnected)?;
        let mut line = serde_json::to_string(frame).map_err(|e| PushError::Transport(e.to_string()))?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn connect_inner(&mut self) -> Result<(), PushError> {
        let stream = TcpStream::connect(&self.addr).await?;
        let (read_half, write_half) = stream.into_split();
        self.reader = Some(BufReader::new(read_half).lines());
        self.writer = Some(write_half);
        tracing::info!(addr = %self.addr, "Connected to push relay");

        let hello = PushFrame::new(
            push_events::CONNECT,
            None,
            json!({
                "app_key": self.app_key,
                "cluster": self.cluster,
                "protocol": push_events::PROTOCOL_VERSION,
            }),
        );
        self.send(&hello).await
    }

    async fn next_frame_inner(&mut self) -> Result<Option<PushFrame>, PushError> {
        loop {
            let reader = self.reader.as_mut().ok_or(PushError::NotConnected)?;
            let Some(line) = reader.next_line().await? else {
                tracing::info!(addr = %self.addr, "Push relay closed the connection");
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            let frame = match PushFrame::parse(&line) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, line = %line, "Skipping unparseable push frame");
                    continue;
                }
            };

            if frame.event == push_events::PING {
                self.send(&PushFrame::new(push_events::PONG, None, json!({}))).await?;
                continue;
            }
            return Ok(Some(frame));
        }
    }
}

impl PushTransport for RelayTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<(), PushError>> {
        Box::pin(self.connect_inner())
    }

    fn subscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, Result<(), PushError>> {
        Box::pin(async move {
            let frame = PushFrame::new(push_events::SUBSCRIBE, None, json!({ "channel": channel }));
            self.send(&frame).await
        })
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<PushFrame>, PushError>> {
        Box::pin(self.next_frame_inner())
    }

    fn unsubscribe<'a>(&'a mut self, channel: &'a str) -> BoxFuture<'a, Result<(), PushError>> {
        Box::pin(async move {
            let frame = PushFrame::new(push_events::UNSUBSCRIBE, None, json!({ "channel": channel }));
            self.send(&frame).await
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.reader = None;
            if let Some(mut writer) = self.writer.take() {
                writer.shutdown().await.ok();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_decodes_string_data() {
        let frame = PushFrame::parse(
            r#"{"event":"Ticket-changes","channel":"live","data":"{\"model_name\":\"Ticket\"}"}"#,
        )
        .unwrap();

        assert_eq!(frame.event, "Ticket-changes");
        assert!(frame.is_for("live"));
        assert_eq!(frame.data, json!({ "model_name": "Ticket" }));
    }

    #[test]
    fn test_parse_keeps_plain_string_data() {
        let frame = PushFrame::parse(r#"{"event":"pusher:error","data":"boom"}"#).unwrap();
        assert_eq!(frame.data, json!("boom"));
        assert_eq!(frame.channel, None);
    }

    #[test]
    fn test_missing_configuration_lists_names() {
        let error = PushError::MissingConfiguration(vec!["PUSHER_APP_KEY", "PUSHER_APP_CHANNEL"]);
        assert_eq!(
            error.to_string(),
            "Missing push configuration: PUSHER_APP_KEY, PUSHER_APP_CHANNEL"
        );
    }

    #[tokio::test]
    async fn test_relay_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let mut received = Vec::new();

            received.push(lines.next_line().await.unwrap().unwrap());
            received.push(lines.next_line().await.unwrap().unwrap());

            let script = concat!(
                "{\"event\":\"pusher:ping\",\"data\":{}}\n",
                "\n",
                "not json\n",
                "{\"event\":\"Ticket-changes\",\"channel\":\"live\",\"data\":\"{\\\"model_name\\\":\\\"Ticket\\\"}\"}\n",
            );
            write_half.write_all(script.as_bytes()).await.unwrap();

            received.push(lines.next_line().await.unwrap().unwrap());
            received.push(lines.next_line().await.unwrap().unwrap());
            received
        });

        let mut transport = RelayTransport::new(addr, "key", "eu");
        transport.connect().await.unwrap();
        transport.subscribe("live").await.unwrap();

        let frame = transport.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.event, "Ticket-changes");
        assert_eq!(frame.data["model_name"], "Ticket");

        transport.unsubscribe("live").await.unwrap();
        transport.disconnect().await;
        assert!(!transport.is_connected());

        let received: Vec<Value> = server
            .await
            .unwrap()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(received[0]["event"], "pusher:connect");
        assert_eq!(received[0]["data"]["app_key"], "key");
        assert_eq!(received[0]["data"]["protocol"], 7);
        assert_eq!(received[1], json!({ "event": "pusher:subscribe", "data": { "channel": "live" } }));
        assert_eq!(received[2]["event"], "pusher:pong");
        assert_eq!(received[3]["event"], "pusher:unsubscribe");
    }

    #[tokio::test]
    async fn test_next_frame_requires_connection() {
        let mut transport = RelayTransport::new("127.0.0.1:1", "key", "eu");
        assert_eq!(transport.next_frame().await, Err(PushError::NotConnected));
    }
}
