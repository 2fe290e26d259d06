//! Bidirectional byte relay between a client and its backend.
//!
//! Each direction runs in its own task and owns the read half of its source
//! and the write half of its destination. When a direction ends, for any
//! reason, it half-closes what it owns: no more reads from the source, no more
//! writes to the destination. The peer observes end-of-stream and the other
//! direction winds down on its own. Both sockets are closed once both tasks
//! have returned.

use std::{fmt, io, net::Shutdown};

use socket2::SockRef;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{tcp::OwnedReadHalf, TcpStream},
};
use tracing::{debug, warn};

/// Bytes read per chunk in each direction.
pub const RELAY_BUFFER_SIZE: usize = 1024 * 1024;

/// Read side of a stream that can stop receiving without closing the socket.
pub trait ReadShutdown {
    fn shutdown_read(&self) -> io::Result<()>;
}

impl ReadShutdown for OwnedReadHalf {
    fn shutdown_read(&self) -> io::Result<()> {
        let stream: &TcpStream = self.as_ref();
        SockRef::from(stream).shutdown(Shutdown::Read)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::ClientToBackend => "client→backend",
            Direction::BackendToClient => "backend→client",
        })
    }
}

/// Bytes forwarded in each direction over the life of a tunnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

/// Relay `client` ↔ `backend` until both directions have ended.
pub async fn relay(client: TcpStream, backend: TcpStream) -> RelayReport {
    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    let upstream = tokio::spawn(pump(client_read, backend_write, Direction::ClientToBackend));
    let downstream = tokio::spawn(pump(backend_read, client_write, Direction::BackendToClient));

    let (upstream, downstream) = tokio::join!(upstream, downstream);

    RelayReport {
        client_to_backend: joined(upstream, Direction::ClientToBackend),
        backend_to_client: joined(downstream, Direction::BackendToClient),
    }
}

fn joined(result: Result<u64, tokio::task::JoinError>, direction: Direction) -> u64 {
    result.unwrap_or_else(|e| {
        warn!(%direction, error = %e, "relay task did not complete");
        0
    })
}

/// Copy `reader` into `writer` one chunk at a time, then half-close both.
///
/// Returns the number of bytes fully written to `writer`.
async fn pump<R, W>(mut reader: R, mut writer: W, direction: Direction) -> u64
where
    R: AsyncRead + ReadShutdown + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut forwarded: u64 = 0;

    let outcome: io::Result<()> = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        // write_all fails with WriteZero on a short write instead of spinning.
        if let Err(e) = writer.write_all(&buf[..n]).await {
            break Err(e);
        }
        forwarded += n as u64;
    };

    match outcome {
        Ok(()) => debug!(%direction, bytes = forwarded, "end of stream"),
        Err(e) => debug!(%direction, bytes = forwarded, error = %e, "relay direction failed"),
    }

    if let Err(e) = reader.shutdown_read() {
        debug!(%direction, error = %e, "read shutdown failed");
    }
    if let Err(e) = writer.shutdown().await {
        debug!(%direction, error = %e, "write shutdown failed");
    }

    forwarded
}
