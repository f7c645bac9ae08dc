use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::constants::env;

/// Stderr logging at INFO, plus a DEBUG file log when `LIVETRACK_LOG_FILE`
/// is set. Safe to call more than once; later calls are no-ops.
pub fn init_tracing_with_service(service_name: &str) {
    let file_logging = std::env::var(env::LOG_FILE).ok().filter(|p| !p.is_empty());

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);
    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = file_logging.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
                None
            }
        }
    });

    let initialized = match file {
        Some(file) => {
            let file_layer = fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
            registry.with(file_layer).try_init()
        }
        None => registry.try_init(),
    };

    if initialized.is_ok() {
        tracing::info!(service = service_name, "Tracing initialized");
        if let Some(path) = file_logging {
            eprintln!("File logging enabled: {}", path);
        }
    }
}
