//! `http-tunnel` — binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`](config::Config) from environment variables.
//! 2. Initialise structured JSON logging.
//! 3. Watch for Ctrl-C / SIGTERM to stop accepting.
//! 4. Start the TCP accept loop, tunnelling each connection to the backend.
//!
//! A write to a peer that has gone away surfaces as an `EPIPE` error on that
//! connection only: the Rust runtime ignores `SIGPIPE` before `main` runs.

mod backend;
mod config;
mod handshake;
mod proxy;
mod relay;
mod telemetry;
mod tuning;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = config::Config::from_env().map_err(|e| {
        eprintln!("ERROR: http-tunnel configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "http-tunnel starting");

    // -----------------------------------------------------------------------
    // 3. Shutdown signal
    // -----------------------------------------------------------------------
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, no longer accepting connections");
        trigger.cancel();
    });

    // -----------------------------------------------------------------------
    // 4. Tunnel
    // -----------------------------------------------------------------------
    proxy::run(&cfg, shutdown).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
