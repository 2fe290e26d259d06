//! Best-effort socket options for bulk, low-latency forwarding.

use socket2::SockRef;
use tracing::debug;

/// Default `SO_RCVBUF` / `SO_SNDBUF` size.
pub const DEFAULT_SOCKET_BUFFER_SIZE: usize = 1024 * 1024;

/// Options applied to the listener and to every client and backend socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    buffer_size: usize,
}

impl Tuning {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Disable Nagle, size both kernel buffers and enable keep-alive probes.
    ///
    /// Never fails: an option the platform rejects is logged and skipped.
    pub fn apply<'s, S>(&self, socket: &'s S)
    where
        SockRef<'s>: From<&'s S>,
    {
        let sock = SockRef::from(socket);

        if let Err(e) = sock.set_tcp_nodelay(true) {
            debug!(error = %e, "TCP_NODELAY not applied");
        }
        if let Err(e) = sock.set_recv_buffer_size(self.buffer_size) {
            debug!(error = %e, size = self.buffer_size, "SO_RCVBUF not applied");
        }
        if let Err(e) = sock.set_send_buffer_size(self.buffer_size) {
            debug!(error = %e, size = self.buffer_size, "SO_SNDBUF not applied");
        }
        if let Err(e) = sock.set_keepalive(true) {
            debug!(error = %e, "SO_KEEPALIVE not applied");
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn apply_sets_nodelay_and_keepalive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();

        Tuning::default().apply(&stream);

        let sock = SockRef::from(&stream);
        assert!(sock.tcp_nodelay().unwrap());
        assert!(sock.keepalive().unwrap());
        assert!(sock.recv_buffer_size().unwrap() > 0);
        assert!(sock.send_buffer_size().unwrap() > 0);
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();

        let tuning = Tuning::new(64 * 1024);
        tuning.apply(&stream);
        let first = SockRef::from(&stream).recv_buffer_size().unwrap();
        tuning.apply(&stream);
        let second = SockRef::from(&stream).recv_buffer_size().unwrap();

        assert_eq!(first, second);
        assert!(SockRef::from(&stream).tcp_nodelay().unwrap());
    }

    #[tokio::test]
    async fn apply_works_on_listeners() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Tuning::default().apply(&listener);
        assert!(SockRef::from(&listener).keepalive().unwrap());
    }
}
