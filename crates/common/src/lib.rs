//! Wire constants, upgrade detection, and connection errors shared by `http-tunnel` crates.

pub mod error;
pub mod protocol;

pub use error::{ConnectionState, TunnelError};
pub use protocol::Intent;
