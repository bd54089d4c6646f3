//! Error types
//!
//! Startup errors are fatal and end the process; serve errors are local to
//! one request and map onto an HTTP status.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions raised before the accept loop starts
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("serving root '{}' is not an accessible directory: {source}", path.display())]
    Root { path: PathBuf, source: io::Error },

    #[error("invalid server name '{0}': not a valid header value")]
    ServerName(String),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("failed to open log file: {0}")]
    Logger(#[source] io::Error),

    #[error("failed to build runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to register signal handlers: {0}")]
    Signal(#[source] io::Error),
}

/// Per-request failure while resolving or reading from the serving root
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("not found")]
    NotFound,

    #[error("i/o error on '{}': {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl ServeError {
    /// Classify an I/O error: a missing entry is a 404, anything else a 500
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotFound,
            _ => Self::Io {
                path: path.into(),
                source,
            },
        }
    }
}
