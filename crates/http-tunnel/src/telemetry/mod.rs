//! Structured logging for the tunnel.
//!
//! JSON lines on stdout, filtered by `RUST_LOG` when set and `LOG_LEVEL`
//! otherwise. Every event inside a tunnel carries the enclosing
//! `connection` span (`conn_id`, `peer_addr`) so one client can be followed
//! through its lifecycle. Payload bytes are never logged, only their counts.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise tunnel tracing subscriber: {e}"))
}
