//! Installs the global tracing subscriber.
//!
//! The configured level is the default directive; `RUST_LOG` directives are layered on top.
//! Logs go to stdout, or are appended to the configured log file without ANSI colors.

use std::{fs::OpenOptions, path::Path, sync::Mutex};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{config::PingMonitorConfig, error::PingMonitorErrorKind};

/// Parses a level name such as `info` or `DEBUG`.
pub fn parse_level(level: &str) -> Result<LevelFilter, PingMonitorErrorKind> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| PingMonitorErrorKind::Logging(format!("unknown log level '{level}'")))
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Installs the subscriber described by `config`. Fails if one is already installed.
pub fn init(config: &PingMonitorConfig) -> Result<(), PingMonitorErrorKind> {
    let filter = env_filter(parse_level(config.log_level())?);

    let file_layer = match config.log_file() {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };
    let stdout_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| PingMonitorErrorKind::Logging(e.to_string()))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, PingMonitorErrorKind> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PingMonitorErrorKind::Logging(format!("{}: {e}", path.display())))
}
