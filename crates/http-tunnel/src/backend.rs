//! Outbound connection to the backend.

use std::net::SocketAddr;

use common::TunnelError;
use tokio::net::TcpStream;
use tracing::debug;

use crate::tuning::Tuning;

/// Dial a fresh, tuned connection to `addr`.
///
/// Every client gets its own backend connection; nothing is pooled or retried.
pub async fn dial(addr: SocketAddr, tuning: &Tuning) -> Result<TcpStream, TunnelError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TunnelError::BackendDial { addr, source })?;
    tuning.apply(&stream);
    debug!(backend = %addr, "backend connection established");
    Ok(stream)
}
