use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::events::CoreEvent;
use crate::fetch::{FetchError, StatisticsSource};
use crate::models::{ChangeNotification, FetchResponse, FilterState};
use crate::push::{ListenerExit, PushListener, PushTransport};
use crate::reporting::{ErrorReport, ErrorReporter};
use crate::stats::{SharedSyncStats, SyncStats};
use crate::sync::{Settlement, SyncEngine, ViewModel};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum TrackerCommand {
    UpdateFilters(FilterState),
    Notify(ChangeNotification),
    Refresh,
    Shutdown,
}

/// Cloneable access to a running tracker.
#[derive(Clone)]
pub struct TrackerHandle {
    command_tx: mpsc::UnboundedSender<TrackerCommand>,
    view_rx: watch::Receiver<Arc<ViewModel>>,
    events_tx: broadcast::Sender<CoreEvent>,
    stats: SharedSyncStats,
}

impl TrackerHandle {
    pub fn send(&self, command: TrackerCommand) -> Result<(), mpsc::error::SendError<TrackerCommand>> {
        self.command_tx.send(command)
    }

    pub fn update_filters(&self, filters: FilterState) -> Result<(), mpsc::error::SendError<TrackerCommand>> {
        self.send(TrackerCommand::UpdateFilters(filters))
    }

    pub fn notify(&self, notification: ChangeNotification) -> Result<(), mpsc::error::SendError<TrackerCommand>> {
        self.send(TrackerCommand::Notify(notification))
    }

    pub fn refresh(&self) -> Result<(), mpsc::error::SendError<TrackerCommand>> {
        self.send(TrackerCommand::Refresh)
    }

    /// The latest published view model.
    pub fn view(&self) -> Arc<ViewModel> {
        self.view_rx.borrow().clone()
    }

    pub fn watch_view(&self) -> watch::Receiver<Arc<ViewModel>> {
        self.view_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events_tx.subscribe()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.snapshot()
    }

    pub fn shared_stats(&self) -> &SharedSyncStats {
        &self.stats
    }
}

/// Owns the tracker task and the optional push listener.
pub struct TrackerRuntime {
    handle: TrackerHandle,
    notify_tx: mpsc::UnboundedSender<ChangeNotification>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    task: JoinHandle<()>,
    listener: Option<JoinHandle<ListenerExit>>,
}

impl TrackerRuntime {
    /// Spawn the tracker task and request the initial load.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &TrackerConfig,
        source: Arc<dyn StatisticsSource>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let stats = SharedSyncStats::new();
        let filters = config.initial_filters();
        if let Some(tenant) = config.tenant() {
            tracing::info!(?tenant, organization_id = ?filters.organization_id, "Tenant profile active");
        }

        let engine = SyncEngine::new(config.debounce(), filters, stats.clone());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Arc::new(engine.view_model()));
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);

        let worker = TrackerWorker {
            engine,
            source,
            reporter,
            view_tx,
            events_tx: events_tx.clone(),
            published_revision: None,
        };
        let task = tokio::spawn(worker.run(command_rx, notify_rx, shutdown_rx, shutdown_tx.clone()));

        Self {
            handle: TrackerHandle {
                command_tx,
                view_rx,
                events_tx,
                stats,
            },
            notify_tx,
            shutdown_tx,
            task,
            listener: None,
        }
    }

    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Feed the tracker from a push listener until shutdown.
    pub fn attach_listener<T: PushTransport + 'static>(&mut self, listener: PushListener<T>) {
        tracing::info!(channel = listener.channel(), "Attaching push listener");
        let notify_tx = self.notify_tx.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.listener = Some(tokio::spawn(listener.run(notify_tx, shutdown_rx)));
    }

    /// Stop the listener, abort in-flight fetches and wait for both tasks.
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);
        let _ = self.handle.send(TrackerCommand::Shutdown);

        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Tracker task failed");
        }
        if let Some(listener) = self.listener {
            match listener.await {
                Ok(exit) => tracing::debug!(?exit, "Push listener joined"),
                Err(e) => tracing::error!(error = %e, "Push listener task failed"),
            }
        }
    }
}

type FetchOutcome = (u64, Result<FetchResponse, FetchError>);

struct TrackerWorker {
    engine: SyncEngine,
    source: Arc<dyn StatisticsSource>,
    reporter: Arc<dyn ErrorReporter>,
    view_tx: watch::Sender<Arc<ViewModel>>,
    events_tx: broadcast::Sender<CoreEvent>,
    published_revision: Option<u64>,
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

impl TrackerWorker {
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<TrackerCommand>,
        mut notify_rx: mpsc::UnboundedReceiver<ChangeNotification>,
        mut shutdown_rx: watch::Receiver<bool>,
        shutdown_tx: Arc<watch::Sender<bool>>,
    ) {
        let mut fetches: JoinSet<FetchOutcome> = JoinSet::new();
        self.engine.start(now());
        self.publish();

        loop {
            let wake = self
                .engine
                .next_deadline()
                .map(Instant::from_std)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            let armed = self.engine.next_deadline().is_some();

            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
                command = command_rx.recv() => match command {
                    Some(TrackerCommand::UpdateFilters(filters)) => {
                        self.engine.update_filters(filters, now());
                    }
                    Some(TrackerCommand::Notify(notification)) => self.on_notification(notification),
                    Some(TrackerCommand::Refresh) => {
                        self.engine.refresh(now());
                    }
                    Some(TrackerCommand::Shutdown) | None => break,
                },
                Some(notification) = notify_rx.recv() => self.on_notification(notification),
                _ = tokio::time::sleep_until(wake), if armed => {
                    while let Some(ticket) = self.engine.poll_fetch(now()) {
                        let source = self.source.clone();
                        fetches.spawn(async move {
                            let result = source.fetch(&ticket.query).await;
                            (ticket.seq, result)
                        });
                    }
                }
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => match joined {
                    Ok((seq, result)) => self.on_settled(seq, result),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => tracing::error!(error = %e, "Fetch task failed"),
                },
            }

            self.publish();
        }

        shutdown_tx.send_replace(true);
        fetches.abort_all();
        self.engine.teardown();
        self.publish();
        tracing::info!("Tracker stopped");
    }

    fn on_notification(&mut self, notification: ChangeNotification) {
        let _ = self.events_tx.send(CoreEvent::ModelChanged {
            model_name: notification.model_name.clone(),
        });
        self.engine.notify(notification, now());
    }

    fn on_settled(&mut self, seq: u64, result: Result<FetchResponse, FetchError>) {
        if let Settlement::Failed(error) = self.engine.settle(seq, result) {
            let _ = self.events_tx.send(CoreEvent::FetchFailed {
                message: error.to_string(),
            });

            let reporter = self.reporter.clone();
            let report = ErrorReport::from_fetch_error(&error);
            tokio::spawn(async move {
                if let Err(e) = reporter.report(&report).await {
                    tracing::warn!(error = %e, "Failed to forward fetch error");
                }
            });
        }
    }

    fn publish(&mut self) {
        let revision = self.engine.revision();
        if self.published_revision == Some(revision) {
            return;
        }
        self.published_revision = Some(revision);

        let view = Arc::new(self.engine.view_model());
        self.view_tx.send_replace(view.clone());
        let _ = self.events_tx.send(CoreEvent::ViewChanged(view));
    }
}
