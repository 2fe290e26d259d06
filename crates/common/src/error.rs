//! Connection lifecycle states and the errors that abort a connection.

use std::{fmt, io, net::SocketAddr};

use thiserror::Error;

/// Where a single client connection is in its lifecycle.
///
/// ```text
/// Accepted → HeaderRead → BackendDialed → ResponseSent → Relaying → Closed
///     └──────────┴─────────────┴──────────────┴──→ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    HeaderRead,
    BackendDialed,
    ResponseSent,
    Relaying,
    Closed,
    Aborted,
}

impl ConnectionState {
    /// Stable lowercase name used as a log field value.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::HeaderRead => "header_read",
            ConnectionState::BackendDialed => "backend_dialed",
            ConnectionState::ResponseSent => "response_sent",
            ConnectionState::Relaying => "relaying",
            ConnectionState::Closed => "closed",
            ConnectionState::Aborted => "aborted",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Aborted)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection-fatal error.
///
/// Any of these aborts the one connection it occurred on. Nothing is retried
/// and no other connection or the listener is affected.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The client closed before a header frame could be captured.
    #[error("client closed before sending a complete header ({received} bytes received)")]
    HeaderIncomplete { received: usize },

    /// Reading the header frame from the client failed.
    #[error("header read failed: {0}")]
    HeaderRead(#[source] io::Error),

    /// The backend could not be reached.
    #[error("backend dial to {addr} failed: {source}")]
    BackendDial {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The handshake response could not be delivered to the client.
    #[error("response write failed: {0}")]
    ResponseWrite(#[source] io::Error),
}

impl TunnelError {
    /// The state the connection was in when this error aborted it.
    pub fn aborted_from(&self) -> ConnectionState {
        match self {
            TunnelError::HeaderIncomplete { .. } | TunnelError::HeaderRead(_) => {
                ConnectionState::Accepted
            }
            TunnelError::BackendDial { .. } => ConnectionState::HeaderRead,
            TunnelError::ResponseWrite(_) => ConnectionState::BackendDialed,
        }
    }
}
