//! ## Ping Monitor Configuration Module
//!
//! Defines [`PingMonitorConfig`], the configuration of the monitor.
//!
//! Values are layered, later sources winning:
//! - built-in defaults
//! - an optional TOML file
//! - environment variables (`DISH_IP`, `DISH_PORT`, `POLL_INTERVAL`, `ALERT_THRESHOLD`,
//!   `HTTP_PORT`, `LOG_LEVEL`, `REQUEST_TIMEOUT`, `LOG_FILE`)
use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use ext_config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::PingMonitorErrorKind;

/// Configuration for the ping monitor.
#[derive(Debug, Deserialize, Clone)]
pub struct PingMonitorConfig {
    /// Address of the dish's gRPC API.
    #[serde(default = "default_dish_ip")]
    dish_ip: String,
    /// Port of the dish's gRPC API.
    #[serde(default = "default_dish_port")]
    dish_port: u16,
    /// Seconds between the end of one poll and the start of the next.
    #[serde(default = "default_poll_interval")]
    poll_interval: f64,
    /// Drop rate above which a warning is logged. Does not affect exported values.
    #[serde(default = "default_alert_threshold")]
    alert_threshold: f64,
    /// Port the HTTP server listens on, on all interfaces.
    #[serde(default = "default_http_port")]
    http_port: u16,
    /// Log verbosity (`trace`, `debug`, `info`, `warn`, `error`).
    #[serde(default = "default_log_level")]
    log_level: String,
    /// Seconds a single dish RPC may take.
    #[serde(default = "default_request_timeout")]
    request_timeout: f64,
    /// Optional file to append logs to instead of stdout.
    #[serde(default)]
    log_file: Option<PathBuf>,
}

fn default_dish_ip() -> String {
    "192.168.100.1".to_string()
}

fn default_dish_port() -> u16 {
    9200
}

fn default_poll_interval() -> f64 {
    2.0
}

fn default_alert_threshold() -> f64 {
    0.1
}

fn default_http_port() -> u16 {
    9877
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> f64 {
    10.0
}

impl Default for PingMonitorConfig {
    fn default() -> Self {
        Self {
            dish_ip: default_dish_ip(),
            dish_port: default_dish_port(),
            poll_interval: default_poll_interval(),
            alert_threshold: default_alert_threshold(),
            http_port: default_http_port(),
            log_level: default_log_level(),
            request_timeout: default_request_timeout(),
            log_file: None,
        }
    }
}

impl PingMonitorConfig {
    /// Creates a configuration from explicit values.
    pub fn new(
        dish_ip: String,
        dish_port: u16,
        poll_interval: f64,
        alert_threshold: f64,
        http_port: u16,
    ) -> Self {
        Self {
            dish_ip,
            dish_port,
            poll_interval,
            alert_threshold,
            http_port,
            ..Default::default()
        }
    }

    /// Loads the configuration from an optional TOML file and the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, PingMonitorErrorKind> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config: Self = builder
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document, without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, PingMonitorErrorKind> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the monitor cannot run with.
    pub fn validate(&self) -> Result<(), PingMonitorErrorKind> {
        if !self.poll_interval.is_finite() || self.poll_interval <= 0.0 {
            return Err(PingMonitorErrorKind::InvalidConfig(format!(
                "poll_interval must be a positive number of seconds, got {}",
                self.poll_interval
            )));
        }
        if !(0.0..=1.0).contains(&self.alert_threshold) {
            return Err(PingMonitorErrorKind::InvalidConfig(format!(
                "alert_threshold must be within [0.0, 1.0], got {}",
                self.alert_threshold
            )));
        }
        if !self.request_timeout.is_finite() || self.request_timeout <= 0.0 {
            return Err(PingMonitorErrorKind::InvalidConfig(format!(
                "request_timeout must be a positive number of seconds, got {}",
                self.request_timeout
            )));
        }
        Ok(())
    }

    pub fn dish_ip(&self) -> &str {
        &self.dish_ip
    }

    pub fn dish_port(&self) -> u16 {
        self.dish_port
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }

    pub fn alert_threshold(&self) -> f64 {
        self.alert_threshold
    }

    /// Returns the monitoring server bind address.
    pub fn monitoring_address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.http_port))
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn set_log_file(&mut self, log_file: Option<PathBuf>) {
        if let Some(log_file) = log_file {
            self.log_file = Some(log_file);
        }
    }
}
