//! Centralized file-based logging system
//!
//! Writes logs to files under the configured directory, separated by target:
//! - main/   - all events, JSON
//! - error/  - WARN and ERROR only
//! - ledger/ - trades and registrations
//! - engine/ - price ticks and broadcasts
//! - api/    - HTTP and WebSocket server

use super::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Per-target log files
const LOG_TARGETS: [&str; 5] = ["main", "error", "ledger", "engine", "api"];

/// Initialize centralized file logging
///
/// Creates the log directory with one subdirectory per target.
/// Returns WorkerGuards which must be kept alive for the duration of the program.
pub fn init_logging(config: &LoggingConfig) -> io::Result<Vec<WorkerGuard>> {
    let logs_dir = config.dir.as_path();
    for target in LOG_TARGETS {
        fs::create_dir_all(logs_dir.join(target))?;
    }

    let mut guards = Vec::new();

    // Main log - all logs
    let (main_appender, main_guard) = create_appender(logs_dir, "main");
    guards.push(main_guard);

    let (error_appender, error_guard) = create_appender(logs_dir, "error");
    guards.push(error_guard);

    let (ledger_appender, ledger_guard) = create_appender(logs_dir, "ledger");
    guards.push(ledger_guard);

    let (engine_appender, engine_guard) = create_appender(logs_dir, "engine");
    guards.push(engine_guard);

    let (api_appender, api_guard) = create_appender(logs_dir, "api");
    guards.push(api_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    // Error log - ERROR and WARN only, plus explicit `target: "error"` events
    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| {
            *metadata.level() <= LevelFilter::WARN || metadata.target() == "error"
        }));

    let ledger_layer = tracing_subscriber::fmt::layer()
        .with_writer(ledger_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| {
            metadata.target().contains("ledger") || metadata.target().contains("trade")
        }));

    let engine_layer = tracing_subscriber::fmt::layer()
        .with_writer(engine_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| {
            metadata.target().contains("engine")
                || metadata.target().contains("oracle")
                || metadata.target().contains("broadcast")
        }));

    let api_layer = tracing_subscriber::fmt::layer()
        .with_writer(api_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| {
            metadata.target().contains("api") || metadata.target().contains("session")
        }));

    // Console layer for development
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(ledger_layer)
        .with(engine_layer)
        .with(api_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    tracing::info!(dir = %logs_dir.display(), "Logging system initialized");

    Ok(guards)
}

/// Create a daily rolling file appender under `<dir>/<name>/`
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir.join(name), name);
    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_ledger {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "ledger", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_engine {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "engine", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_api {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "api", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
