use crate::consequences::{ActionSpecifier, ConsequenceError, ExecutionStatus, FilterRef};
use crate::{CONSOLE_TARGET, ERROR_TARGET, EXECUTOR_TARGET};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default log directory name
pub const LOG_DIR: &str = "logs";
/// Execution log file name
pub const EXECUTION_LOG_FILE: &str = "consequences";

/// Initialize the logging system with console and file outputs
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(log_dir: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let log_dir = log_dir.as_ref();
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let execution_file = RollingFileAppender::new(Rotation::DAILY, log_dir, EXECUTION_LOG_FILE);

    // Human-readable console output
    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    // JSON execution log
    let execution_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(execution_file);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(execution_layer)
        .try_init()?;

    info!("Logging system initialized");
    Ok(())
}

fn filter_names(filters: &[FilterRef]) -> String {
    filters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Log the start of an executor run; returns the start time for
/// [`log_execution_end`]
pub fn log_execution_start(specifier: &ActionSpecifier, filters: &[FilterRef]) -> Instant {
    info!(
        target: EXECUTOR_TARGET,
        action = %specifier.action,
        user = %specifier.user.name,
        page = %specifier.target.prefixed_text(),
        filters = %filter_names(filters),
        event = "start",
        "Consequence execution started"
    );
    Instant::now()
}

/// Log the outcome of an executor run
pub fn log_execution_end(specifier: &ActionSpecifier, status: &ExecutionStatus, started: Instant) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or_default();
    let actions_taken = status
        .actions_taken
        .iter()
        .filter(|(_, actions)| !actions.is_empty())
        .map(|(filter, actions)| format!("{filter}:{}", actions.join("+")))
        .collect::<Vec<_>>()
        .join(",");

    info!(
        target: EXECUTOR_TARGET,
        action = %specifier.action,
        user = %specifier.user.name,
        actions_taken = %actions_taken,
        messages = status.messages.len(),
        good = status.is_good(),
        duration_ms = duration_ms,
        event = "end",
        "Consequence execution completed"
    );
}

/// Log a failed executor run
pub fn log_execution_error(specifier: &ActionSpecifier, error: &ConsequenceError) {
    error!(
        target: ERROR_TARGET,
        action = %specifier.action,
        user = %specifier.user.name,
        page = %specifier.target.prefixed_text(),
        error = %error,
        "Consequence execution failed"
    );
}

pub fn log_console(message: String) {
    info!(
        target: CONSOLE_TARGET,
        message = %message,
        event = "console",
    );
}
