use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use livetrack_core::fetch::HttpStatisticsSource;
use livetrack_core::push::{ListenerExit, PushListener};
use livetrack_core::reporting::{ErrorReporter, NoopReporter, WebhookReporter};
use livetrack_core::stats::SharedSyncStats;
use livetrack_core::{TrackerConfig, TrackerRuntime};

use super::config::CliConfig;
use super::http;

/// Upper bound for `livetrack fetch`
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

fn reporter_for(config: &TrackerConfig) -> Arc<dyn ErrorReporter> {
    match &config.error_webhook {
        Some(url) => Arc::new(WebhookReporter::new(url)),
        None => Arc::new(NoopReporter),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Run the tracker with push updates and serve it over HTTP until ctrl-c.
pub async fn run_serve(config: CliConfig) -> Result<()> {
    let tracker = &config.tracker;
    let source = Arc::new(HttpStatisticsSource::from_config(tracker));
    let mut runtime = TrackerRuntime::start(tracker, source, reporter_for(tracker));
    let handle = runtime.handle();

    match PushListener::from_config(&tracker.push, handle.shared_stats().clone()) {
        Ok(listener) => runtime.attach_listener(listener),
        Err(e) => tracing::warn!(error = %e, "Push updates disabled"),
    }

    let result = tokio::select! {
        result = http::run_server(config.bind_addr(), handle) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    };

    runtime.shutdown().await;
    result
}

/// Fetch once and print the filtered view with its stats.
pub async fn run_fetch(config: CliConfig, pretty: bool) -> Result<()> {
    let tracker = &config.tracker;
    if !tracker.initial_filters().has_organization() {
        anyhow::bail!("No organization selected; set filters.organization_id or LIVETRACK_TENANT");
    }

    let source = Arc::new(HttpStatisticsSource::from_config(tracker));
    let runtime = TrackerRuntime::start(tracker, source, reporter_for(tracker));
    let mut view_rx = runtime.handle().watch_view();

    let settled = tokio::time::timeout(
        FETCH_TIMEOUT,
        view_rx.wait_for(|view| !view.is_initial_loading && !view.is_updating),
    )
    .await;
    let view = match settled {
        Ok(Ok(view)) => view.clone(),
        Ok(Err(_)) => anyhow::bail!("Tracker stopped before the fetch settled"),
        Err(_) => anyhow::bail!("Timed out after {:?} waiting for statistics", FETCH_TIMEOUT),
    };
    runtime.shutdown().await;

    if let Some(error) = &view.last_error {
        anyhow::bail!("Fetch failed: {}", error);
    }
    print_json(&view, pretty)
}

/// Print every change notification received on the push channel.
pub async fn run_listen(config: CliConfig, pretty: bool) -> Result<()> {
    let listener = PushListener::from_config(&config.tracker.push, SharedSyncStats::new())
        .context("Push channel is not configured")?;
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(listener.run(notify_tx, shutdown_rx));

    loop {
        tokio::select! {
            notification = notify_rx.recv() => match notification {
                Some(notification) => print_json(&notification, pretty)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    shutdown_tx.send_replace(true);
    match task.await.context("Push listener task failed")? {
        ListenerExit::GaveUp(e) => Err(anyhow::Error::new(e).context("Push channel unavailable")),
        ListenerExit::Shutdown | ListenerExit::ReceiverDropped => Ok(()),
    }
}
