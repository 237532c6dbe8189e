//! Server configuration.
//!
//! Every option can come from a command-line flag or a `RESPKV_*`
//! environment variable; flags win.

use crate::storage::ExpiryConfig;
use clap::Parser;
use std::time::Duration;

/// RESP key-value server
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "respkv")]
#[command(about = "In-memory key-value store speaking RESP")]
#[command(version)]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(short = 'H', long, env = "RESPKV_HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Largest amount of unparsed input buffered per connection, in bytes
    #[arg(long, env = "RESPKV_MAX_BUFFER_SIZE", default_value_t = 1024 * 1024)]
    pub max_buffer_size: usize,

    /// Maximum array nesting accepted from clients (0 = unbounded)
    #[arg(long, env = "RESPKV_MAX_DEPTH", default_value_t = 32)]
    pub max_depth: usize,

    /// Run the background sweeper that removes expired keys nobody reads
    #[arg(long, env = "RESPKV_ACTIVE_EXPIRY")]
    pub active_expiry: bool,

    /// Base interval of the expiry sweeper, in milliseconds
    #[arg(long, env = "RESPKV_SWEEP_INTERVAL_MS", default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "RESPKV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            max_buffer_size: 1024 * 1024,
            max_depth: 32,
            active_expiry: false,
            sweep_interval_ms: 100,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Nesting limit for the frame parser, `None` when unbounded.
    pub fn depth_limit(&self) -> Option<usize> {
        (self.max_depth > 0).then_some(self.max_depth)
    }

    /// Sweeper settings, `None` when active expiry is off.
    pub fn expiry(&self) -> Option<ExpiryConfig> {
        self.active_expiry
            .then(|| ExpiryConfig::with_interval(Duration::from_millis(self.sweep_interval_ms)))
    }
}
