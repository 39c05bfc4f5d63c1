//! Free TCP port allocation.
//!
//! The port is reserved by binding a transient listener on the loopback
//! interface and releasing it straight away. Another process may grab the
//! same port before the server binds it; that window is accepted and not
//! handled.

use crate::error::{Error, Result};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

/// Reserves an OS-assigned, currently unused TCP port on loopback.
///
/// Two sequential calls usually return different ports, but that is a
/// best-effort property of the OS allocator rather than a guarantee.
#[tracing::instrument]
pub async fn allocate_free_port() -> Result<u16> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Environment(format!("Failed to bind a free port: {}", e)))?;

    let port = listener
        .local_addr()
        .map_err(|e| Error::Environment(format!("Failed to read bound port: {}", e)))?
        .port();

    drop(listener);
    tracing::debug!(port, "Reserved free port");
    Ok(port)
}
