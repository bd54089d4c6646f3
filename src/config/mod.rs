// Configuration module entry point
// Loads layered configuration and builds the immutable runtime state

mod state;
mod types;

use std::net::SocketAddr;

use crate::error::StartupError;

// Re-export public types
pub use state::AppState;
pub use types::{Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Config file looked up (with any supported extension) when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "csp-serve";

/// Environment variable prefix, e.g. `CSP_SERVE_SERVER__PORT=9000`
const ENV_PREFIX: &str = "CSP_SERVE";

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

impl Config {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// Missing files are fine: the defaults reproduce the reference behaviour
    /// of serving the working directory on port 8080.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        with_defaults(config::Config::builder())?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only, ignoring files and environment
    pub fn defaults() -> Result<Self, config::ConfigError> {
        with_defaults(config::Config::builder())?
            .build()?
            .try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, StartupError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|source| StartupError::InvalidAddress { addr, source })
    }
}

fn with_defaults(builder: Builder) -> Result<Builder, config::ConfigError> {
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.root", ".")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "common")?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default(
            "http.server_name",
            concat!("csp-serve/", env!("CARGO_PKG_VERSION")),
        )?
        .set_default("http.index_files", vec!["index.html", "index.htm"])?
        .set_default("http.directory_listing", true)
}
