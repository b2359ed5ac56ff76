use crate::modules::config::get_data_dir;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn get_log_dir(configured: Option<&str>) -> Result<PathBuf, String> {
    let log_dir = match configured {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => get_data_dir().map_err(|e| e.to_string())?.join("logs"),
    };

    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)
            .map_err(|e| format!("Failed to create log directory: {}", e))?;
    }

    Ok(log_dir)
}

/// Initialize logger system.
///
/// Returns the file writer guard; keep it alive until exit so buffered lines
/// are flushed. Without a usable log directory only the console is used.
pub fn init_logger(configured_dir: Option<&str>) -> Option<WorkerGuard> {
    // Capture log macro logs
    let _ = tracing_log::LogTracer::init();

    // Default to INFO and above
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    let (file_layer, guard) = match get_log_dir(configured_dir) {
        Ok(dir) => {
            // Daily rolling file
            let file_appender = tracing_appender::rolling::daily(dir, "fcors.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Failed to initialize log directory: {}", e);
            (None, None)
        }
    };

    // try_init avoids a panic on re-initialization
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    info!(
        "Logger system initialized (Console{})",
        if guard.is_some() { " + File Persistence" } else { "" }
    );

    guard
}
