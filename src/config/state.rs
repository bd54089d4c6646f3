// Application state module
// Immutable runtime state shared by every connection

use hyper::header::HeaderValue;
use std::path::PathBuf;

use super::types::Config;
use crate::error::StartupError;
use crate::logger::AccessLogFormat;

/// Application state
///
/// Built once at startup from the loaded [`Config`] and shared read-only
/// behind an `Arc`. Nothing in here changes while the server runs.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    /// Canonical serving root, the containment boundary for every lookup
    pub root: PathBuf,
    /// Pre-validated `Server` header value
    pub server_name: HeaderValue,
    pub access_log_format: AccessLogFormat,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let root = config
            .server
            .root
            .canonicalize()
            .map_err(|source| StartupError::Root {
                path: config.server.root.clone(),
                source,
            })?;
        if !root.is_dir() {
            return Err(StartupError::Root {
                path: config.server.root.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotADirectory),
            });
        }

        let server_name = HeaderValue::from_str(&config.http.server_name)
            .map_err(|_| StartupError::ServerName(config.http.server_name.clone()))?;

        let access_log_format = AccessLogFormat::parse(&config.logging.access_log_format);

        Ok(Self {
            config,
            root,
            server_name,
            access_log_format,
        })
    }
}
