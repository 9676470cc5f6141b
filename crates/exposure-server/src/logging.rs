//! Logging initialization.
//!
//! - **Production**: JSON logs to daily files plus compact logs to stdout
//! - **Development**: pretty logs to stdout with span events

use std::path::PathBuf;
use std::sync::OnceLock;

use exposure_core::ServerConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the fallback log level.
pub const LOG_LEVEL_ENV: &str = "EXPOSURE_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: &str = "info";

// Non-blocking writers stop flushing once their guard drops.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the global subscriber for the given server settings.
///
/// The filter comes from `RUST_LOG`, then `EXPOSURE_LOG_LEVEL`, then `info`.
///
/// # Production Mode
///
/// - Daily rolling JSON files in `/var/log/exposure/` on Linux
/// - Compact stdout without ANSI colors for the systemd journal
///
/// # Development Mode
///
/// - Pretty stdout with file, line and span open/close events
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed or, in production,
/// the log directory cannot be created.
pub fn init(config: &ServerConfig) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => fallback_filter(std::env::var(LOG_LEVEL_ENV).ok().as_deref())?,
    };

    if config.production {
        init_production(env_filter)?;
    } else {
        init_development(env_filter);
    }

    Ok(())
}

fn fallback_filter(level: Option<&str>) -> anyhow::Result<EnvFilter> {
    let level = level
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LOG_LEVEL);
    Ok(EnvFilter::try_new(level)?)
}

fn init_production(env_filter: EnvFilter) -> anyhow::Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "exposure");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);

    Ok(())
}

fn init_development(env_filter: EnvFilter) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();
}

/// Directory for production log files.
fn log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/exposure")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "exposure")
            .map(|dirs| dirs.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("./logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_is_valid_path() {
        let dir = log_directory();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_fallback_filter_defaults_to_info() {
        assert_eq!(fallback_filter(None).unwrap().to_string(), "info");
        assert_eq!(fallback_filter(Some("  ")).unwrap().to_string(), "info");
    }

    #[test]
    fn test_fallback_filter_accepts_directives() {
        let filter = fallback_filter(Some("exposure_core=debug")).unwrap();
        assert_eq!(filter.to_string(), "exposure_core=debug");
    }
}
