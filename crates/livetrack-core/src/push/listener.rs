use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::transport::{PushError, PushFrame, PushTransport, RelayTransport};
use crate::config::PushConfig;
use crate::constants::push_events;
use crate::models::{ChangeNotification, ChangeTopic};
use crate::stats::SharedSyncStats;

/// Why the listener stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    Shutdown,
    /// Reconnect attempts exhausted.
    GaveUp(PushError),
    /// Nobody consumes notifications anymore.
    ReceiverDropped,
}

enum SessionEnd {
    Shutdown,
    ReceiverDropped,
    Lost { error: PushError, connected: bool },
}

/// Subscribes to the change channel and forwards every valid notification.
///
/// Reconnects after a lost connection up to `max_retries` times with a fixed
/// backoff; the counter resets after every successful connect. Teardown
/// unbinds the topic handlers, then unsubscribes, then disconnects.
pub struct PushListener<T: PushTransport> {
    transport: T,
    channel: String,
    bound: Vec<ChangeTopic>,
    connected: bool,
    subscribed: bool,
    max_retries: u32,
    backoff: Duration,
    stats: SharedSyncStats,
}

impl PushListener<RelayTransport> {
    /// Build a relay listener. Fails without connecting when credentials are
    /// missing.
    pub fn from_config(config: &PushConfig, stats: SharedSyncStats) -> Result<Self, PushError> {
        let credentials = config.credentials().map_err(PushError::MissingConfiguration)?;
        let transport = RelayTransport::new(&config.relay_addr, credentials.app_key, credentials.cluster);
        Ok(Self::new(transport, credentials.channel, stats)
            .with_retries(config.max_retries, Duration::from_millis(config.retry_backoff_ms)))
    }
}

impl<T: PushTransport> PushListener<T> {
    pub fn new(transport: T, channel: impl Into<String>, stats: SharedSyncStats) -> Self {
        Self {
            transport,
            channel: channel.into(),
            bound: Vec::new(),
            connected: false,
            subscribed: false,
            max_retries: crate::constants::PUSH_MAX_RETRIES,
            backoff: Duration::from_millis(crate::constants::PUSH_RETRY_BACKOFF_MS),
            stats,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Run until shutdown, exhaustion of retries, or until `notify_tx` closes.
    pub async fn run(
        mut self,
        notify_tx: mpsc::UnboundedSender<ChangeNotification>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ListenerExit {
        let mut retries = 0u32;

        let exit = loop {
            match self.session(&notify_tx, &mut shutdown).await {
                SessionEnd::Shutdown => break ListenerExit::Shutdown,
                SessionEnd::ReceiverDropped => break ListenerExit::ReceiverDropped,
                SessionEnd::Lost { error, connected } => {
                    if connected {
                        retries = 0;
                    }
                    self.teardown().await;

                    if retries >= self.max_retries {
                        tracing::error!(error = %error, retries, "Push channel unavailable, giving up");
                        break ListenerExit::GaveUp(error);
                    }
                    retries += 1;
                    self.stats.update(|s| s.reconnect_attempts += 1);
                    tracing::warn!(
                        error = %error,
                        attempt = retries,
                        max = self.max_retries,
                        "Push connection lost, reconnecting in {:?}",
                        self.backoff
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(self.backoff) => {}
                        _ = shutdown.wait_for(|stop| *stop) => break ListenerExit::Shutdown,
                    }
                }
            }
        };

        self.teardown().await;
        tracing::info!(channel = %self.channel, ?exit, "Push listener stopped");
        exit
    }

    async fn session(
        &mut self,
        notify_tx: &mpsc::UnboundedSender<ChangeNotification>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        if *shutdown.borrow() {
            return SessionEnd::Shutdown;
        }

        let connected = tokio::select! {
            result = self.transport.connect() => result,
            _ = shutdown.wait_for(|stop| *stop) => return SessionEnd::Shutdown,
        };
        if let Err(error) = connected {
            return SessionEnd::Lost {
                error,
                connected: false,
            };
        }
        self.connected = true;

        if let Err(error) = self.transport.subscribe(&self.channel).await {
            return SessionEnd::Lost {
                error,
                connected: true,
            };
        }
        self.subscribed = true;
        self.bound = ChangeTopic::ALL.to_vec();
        tracing::info!(channel = %self.channel, topics = self.bound.len(), "Subscribed to change channel");

        loop {
            let frame = tokio::select! {
                frame = self.transport.next_frame() => frame,
                _ = shutdown.wait_for(|stop| *stop) => return SessionEnd::Shutdown,
            };

            match frame {
                Ok(Some(frame)) => {
                    if !self.dispatch(frame, notify_tx) {
                        return SessionEnd::ReceiverDropped;
                    }
                }
                Ok(None) => {
                    return SessionEnd::Lost {
                        error: PushError::Transport("connection closed".to_string()),
                        connected: true,
                    }
                }
                Err(error) => {
                    return SessionEnd::Lost {
                        error,
                        connected: true,
                    }
                }
            }
        }
    }

    /// Route one frame. Returns false once the receiver is gone.
    fn dispatch(&self, frame: PushFrame, notify_tx: &mpsc::UnboundedSender<ChangeNotification>) -> bool {
        match frame.event.as_str() {
            push_events::CONNECTION_ESTABLISHED => {
                tracing::debug!("Push connection established");
                return true;
            }
            push_events::SUBSCRIPTION_SUCCEEDED => {
                tracing::info!(channel = ?frame.channel, "Subscription succeeded");
                return true;
            }
            push_events::SUBSCRIPTION_ERROR => {
                tracing::error!(channel = ?frame.channel, data = %frame.data, "Subscription failed");
                return true;
            }
            push_events::ERROR => {
                tracing::warn!(data = %frame.data, "Push server error");
                return true;
            }
            _ => {}
        }

        let Some(topic) = ChangeTopic::from_event_name(&frame.event).filter(|t| self.bound.contains(t)) else {
            tracing::debug!(event = %frame.event, "Ignoring unbound push event");
            return true;
        };
        if !frame.is_for(&self.channel) {
            tracing::debug!(event = %frame.event, channel = ?frame.channel, "Ignoring event from another channel");
            return true;
        }

        self.stats.update(|s| s.push_events_received += 1);
        match ChangeNotification::from_payload(&frame.data) {
            Some(notification) => {
                tracing::debug!(?topic, model = %notification.model_name, "Model changed");
                notify_tx.send(notification).is_ok()
            }
            None => {
                self.stats.update(|s| s.push_events_dropped += 1);
                tracing::warn!(event = %frame.event, data = %frame.data, "Dropping push event without model_name");
                true
            }
        }
    }

    async fn teardown(&mut self) {
        if !self.bound.is_empty() {
            tracing::debug!(count = self.bound.len(), "Unbinding change handlers");
            self.bound.clear();
        }
        if self.subscribed {
            self.subscribed = false;
            if let Err(e) = self.transport.unsubscribe(&self.channel).await {
                tracing::debug!(error = %e, "Unsubscribe failed");
            }
        }
        if self.connected {
            self.connected = false;
            self.transport.disconnect().await;
        }
    }
}
