//! # Structured Logging Module
//!
//! Environment-aware structured logging that writes human-readable output to
//! the console and JSON lines to a per-process log file. Workers are short-lived,
//! so the file name carries the environment, PID and start timestamp.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs layers, and an
/// already-installed global subscriber is left in place.
pub fn init_structured_logging(log_dir: impl AsRef<Path>) {
    let log_dir = log_dir.as_ref().to_path_buf();
    LOGGER_INITIALIZED.get_or_init(|| install(log_dir));
}

fn install(log_dir: PathBuf) {
    let environment = get_environment();
    let log_level = get_log_level(&environment);
    let pid = process::id();
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let log_filename = format!("{environment}.{pid}.{timestamp}.log");

    let console = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .with_filter(EnvFilter::new(&log_level));

    // Without a writable log directory we still log to the console.
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        let installed = tracing_subscriber::registry().with(console).try_init();
        if installed.is_ok() {
            tracing::warn!(
                log_dir = %log_dir.display(),
                error = %e,
                "Log directory unavailable, console logging only"
            );
        }
        return;
    }

    let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .json()
        .with_filter(EnvFilter::new(&log_level));

    if tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        return;
    }

    tracing::info!(
        pid = pid,
        environment = %environment,
        log_file = %log_dir.join(&log_filename).display(),
        "Structured logging initialized"
    );

    // Keep the background writer alive for the life of the process
    std::mem::forget(guard);
}

/// Current environment from environment variables
fn get_environment() -> String {
    std::env::var("PROMOTE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Log level based on environment; `RUST_LOG` wins when set
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for run-level operations
pub fn log_run_operation(
    operation: &str,
    orchestration_key: &str,
    instance_key: Option<&str>,
    batch_number: Option<u32>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        orchestration_key = %orchestration_key,
        instance_key = instance_key,
        batch_number = batch_number,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RUN_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
