//! ## Error Module
//!
//! Error types used across the ping monitor.
//!
//! - [`TransportError`]: a poll of the dish failed. Always absorbed by the poller and counted,
//!   never surfaced to a caller.
//! - [`InternalError`]: rendering the metrics listing failed. The only condition allowed to fail
//!   a `/metrics` request.
//! - [`PingMonitorErrorKind`]: startup and runtime failures that end the process.
use std::{fmt, net::SocketAddr};

/// Failure of a single poll of the dish.
#[derive(Debug)]
pub enum TransportError {
    /// Could not establish the gRPC channel.
    Connect(String),
    /// The RPC itself failed (status returned by the dish or by the channel).
    Rpc(tonic::Status),
    /// The dish did not answer within the request timeout.
    Timeout,
    /// The dish answered with a response of the wrong kind.
    UnexpectedResponse(&'static str),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(e) => write!(f, "failed to connect to dish: {e}"),
            TransportError::Rpc(status) => write!(
                f,
                "dish rpc failed: {:?}: {}",
                status.code(),
                status.message()
            ),
            TransportError::Timeout => write!(f, "dish did not answer in time"),
            TransportError::UnexpectedResponse(expected) => {
                write!(f, "unexpected response from dish, expected {expected}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

impl From<tonic::Status> for TransportError {
    fn from(status: tonic::Status) -> Self {
        TransportError::Rpc(status)
    }
}

impl From<tonic::transport::Error> for TransportError {
    fn from(e: tonic::transport::Error) -> Self {
        TransportError::Connect(e.to_string())
    }
}

/// Defect while rendering the metrics listing.
#[derive(Debug)]
pub enum InternalError {
    Encode(prometheus::Error),
    Utf8(std::string::FromUtf8Error),
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::Encode(e) => write!(f, "Encoding error: {e}"),
            InternalError::Utf8(e) => write!(f, "UTF-8 error: {e}"),
        }
    }
}

impl std::error::Error for InternalError {}

impl From<prometheus::Error> for InternalError {
    fn from(e: prometheus::Error) -> Self {
        InternalError::Encode(e)
    }
}

impl From<std::string::FromUtf8Error> for InternalError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        InternalError::Utf8(e)
    }
}

/// Errors that stop the monitor.
#[derive(Debug)]
pub enum PingMonitorErrorKind {
    /// The configuration could not be loaded or deserialized.
    Config(ext_config::ConfigError),
    /// The configuration loaded but holds values the monitor cannot run with.
    InvalidConfig(String),
    /// The HTTP listener could not be bound.
    Bind(SocketAddr, std::io::Error),
    /// The HTTP server failed while serving.
    Server(std::io::Error),
    /// The log file could not be opened or the subscriber could not be installed.
    Logging(String),
}

impl fmt::Display for PingMonitorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingMonitorErrorKind::Config(e) => write!(f, "Failed to load configuration: {e}"),
            PingMonitorErrorKind::InvalidConfig(reason) => {
                write!(f, "Invalid configuration: {reason}")
            }
            PingMonitorErrorKind::Bind(addr, e) => write!(f, "Failed to bind {addr}: {e}"),
            PingMonitorErrorKind::Server(e) => write!(f, "Monitoring server error: {e}"),
            PingMonitorErrorKind::Logging(reason) => {
                write!(f, "Failed to initialize logging: {reason}")
            }
        }
    }
}

impl std::error::Error for PingMonitorErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PingMonitorErrorKind::Config(e) => Some(e),
            PingMonitorErrorKind::Bind(_, e) | PingMonitorErrorKind::Server(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ext_config::ConfigError> for PingMonitorErrorKind {
    fn from(e: ext_config::ConfigError) -> Self {
        PingMonitorErrorKind::Config(e)
    }
}
