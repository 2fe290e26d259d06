//! Configuration loading and validation for the tunnel.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::tuning::DEFAULT_SOCKET_BUFFER_SIZE;

/// Validated tunnel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TCP port to accept client connections on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Backend every tunnel is relayed to (e.g. `"127.0.0.1:109"`).
    #[serde(default = "default_backend_addr")]
    pub backend_addr: String,

    /// `SO_RCVBUF` / `SO_SNDBUF` applied to every socket, in bytes.
    #[serde(default = "default_socket_buffer_size")]
    pub socket_buffer_size: usize,

    /// Pending-connection queue length for the listener.
    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: u32,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    8880
}
fn default_backend_addr() -> String {
    "127.0.0.1:109".into()
}
fn default_socket_buffer_size() -> usize {
    DEFAULT_SOCKET_BUFFER_SIZE
}
fn default_listen_backlog() -> u32 {
    4096
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build tunnel configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise tunnel configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        ([0u8, 0, 0, 0], self.listen_port).into()
    }

    /// Parsed backend address. Only fails on an unvalidated config.
    pub fn backend(&self) -> Result<SocketAddr> {
        self.backend_addr
            .trim()
            .parse()
            .with_context(|| format!("BACKEND_ADDR {:?} is not a valid socket address", self.backend_addr))
    }

    fn validate(&self) -> Result<()> {
        self.backend()?;
        if self.socket_buffer_size == 0 {
            anyhow::bail!("SOCKET_BUFFER_SIZE must be > 0");
        }
        if self.listen_backlog == 0 {
            anyhow::bail!("LISTEN_BACKLOG must be > 0");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            backend_addr: default_backend_addr(),
            socket_buffer_size: default_socket_buffer_size(),
            listen_backlog: default_listen_backlog(),
            log_level: default_log_level(),
        }
    }
}
