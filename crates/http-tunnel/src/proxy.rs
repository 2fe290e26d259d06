//! Accept loop and per-connection lifecycle.
//!
//! For each accepted client the tunnel:
//! 1. Reads the request head (see [`handshake::read_header`]).
//! 2. Dials a fresh backend connection.
//! 3. Writes `101 Switching Protocols` or `200 Connection Established`.
//! 4. Relays bytes both ways until both directions have ended.
//!
//! A failure in steps 1–3 aborts that connection only. Connections are not
//! capped and have no idle timeout: a silent peer holds its tunnel open until
//! the other side closes.

use std::{io, net::SocketAddr};

use anyhow::{Context, Result};
use common::{ConnectionState, TunnelError};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::{backend, config::Config, handshake, relay, tuning::Tuning};

/// Bind the listener, then accept until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run(cfg: &Config, shutdown: CancellationToken) -> Result<()> {
    let listen_addr = cfg.listen_addr();
    let backend_addr = cfg.backend()?;
    let tuning = Tuning::new(cfg.socket_buffer_size);

    let listener = bind(listen_addr, cfg.listen_backlog, &tuning)
        .with_context(|| format!("failed to listen on {listen_addr}"))?;
    info!(
        addr = %listen_addr,
        backend = %backend_addr,
        backlog = cfg.listen_backlog,
        "HTTP tunnel listening on port {} -> backend {}",
        listen_addr.port(),
        backend_addr
    );

    serve(listener, backend_addr, tuning, shutdown).await;
    Ok(())
}

/// Create a tuned, reusable listening socket.
pub fn bind(addr: SocketAddr, backlog: u32, tuning: &Tuning) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        debug!(error = %e, "SO_REUSEPORT not applied");
    }
    tuning.apply(&socket);
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    TcpListener::from_std(socket.into())
}

/// Accept loop. Returns once `shutdown` is cancelled.
///
/// The loop only accepts, tunes and spawns; all connection I/O happens in the
/// spawned task. Connections already running are left to finish.
pub async fn serve(
    listener: TcpListener,
    backend_addr: SocketAddr,
    tuning: Tuning,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                info!("accept loop stopped");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((client, peer_addr)) => {
                    tuning.apply(&client);
                    let span = info_span!("connection", conn_id = %Uuid::new_v4(), %peer_addr);
                    tokio::spawn(handle_connection(client, backend_addr, tuning).instrument(span));
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

/// Drive one client through its lifecycle. Both sockets are closed on return.
async fn handle_connection(mut client: TcpStream, backend_addr: SocketAddr, tuning: Tuning) {
    enter(ConnectionState::Accepted);

    let upstream = match establish(&mut client, backend_addr, &tuning).await {
        Ok(upstream) => upstream,
        Err(e) => {
            let from = e.aborted_from();
            if matches!(e, TunnelError::BackendDial { .. }) {
                warn!(%from, error = %e, "connection aborted");
            } else {
                debug!(%from, error = %e, "connection aborted");
            }
            enter(ConnectionState::Aborted);
            return;
        }
    };

    enter(ConnectionState::Relaying);
    let report = relay::relay(client, upstream).await;
    debug!(
        client_to_backend = report.client_to_backend,
        backend_to_client = report.backend_to_client,
        "tunnel closed"
    );
    enter(ConnectionState::Closed);
}

/// Header → backend → response. On error every socket opened here is dropped.
async fn establish<C>(
    client: &mut C,
    backend_addr: SocketAddr,
    tuning: &Tuning,
) -> Result<TcpStream, TunnelError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let frame = handshake::read_header(client).await?;
    let intent = frame.intent();
    trace!(bytes = frame.len(), complete = frame.is_complete(), ?intent, "header frame captured");
    enter(ConnectionState::HeaderRead);

    let upstream = backend::dial(backend_addr, tuning).await?;
    enter(ConnectionState::BackendDialed);

    handshake::write_response(client, intent).await?;
    enter(ConnectionState::ResponseSent);

    Ok(upstream)
}

fn enter(state: ConnectionState) {
    if state.is_terminal() {
        debug!(%state, "connection finished");
    } else {
        trace!(%state, "connection state");
    }
}
