//! Local-to-board TCP port forwarding.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::remote::RemoteConnection;
use crate::tracing::prelude::*;

/// A single port forward from a local TCP port to a board-side port.
///
/// Tunnels are owned by the board that created them and must not outlive
/// the backing connection's forwarding capability. The tag is a label for
/// lookup by purpose, not a unique key.
pub struct Tunnel {
    tag: String,
    target_port: u16,
    host_port: Option<u16>,
    conn: Option<Arc<dyn RemoteConnection>>,
}

impl std::fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("tag", &self.tag)
            .field("target_port", &self.target_port)
            .field("host_port", &self.host_port)
            .field("conn", &self.conn.as_ref().map(|_| "<connection>"))
            .finish()
    }
}

impl Tunnel {
    /// Forward `target_port`, preferring the same local port number.
    ///
    /// When the local port is taken, retries with freshly allocated
    /// ephemeral ports until a forward sticks or the connection reports an
    /// error other than a busy port.
    pub(crate) async fn open(
        conn: Arc<dyn RemoteConnection>,
        tag: &str,
        target_port: u16,
    ) -> Result<Self> {
        let mut host_port = target_port;
        loop {
            match conn.forward(host_port, target_port).await {
                Ok(()) => break,
                Err(Error::HostPortBusy(taken)) => {
                    let next = free_local_port().await?;
                    debug!(taken, next, target_port, "local port busy, retrying forward");
                    host_port = next;
                }
                Err(e) => return Err(e),
            }
        }

        info!(tag, host_port, target_port, "tunnel established");
        Ok(Self {
            tag: tag.to_string(),
            target_port,
            host_port: Some(host_port),
            conn: Some(conn),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Board-side port this tunnel forwards to.
    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    /// The local port actually bound.
    ///
    /// Errors if the tunnel was never established or has been closed.
    pub fn port(&self) -> Result<u16> {
        self.host_port.ok_or(Error::TunnelClosed)
    }

    /// Stop this tunnel's forward and mark the tunnel moribund.
    ///
    /// Only this tunnel's forward is torn down; sibling tunnels sharing the
    /// connection stay up. A closed tunnel must not be reused.
    pub async fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(Error::TunnelClosed)?;
        let host_port = self.host_port.take().ok_or(Error::TunnelClosed)?;
        conn.forward_stop(host_port).await
    }
}

/// Allocate a currently free local TCP port.
///
/// The listener is dropped before returning, so the reservation is
/// best-effort; the forward call re-validates the port.
async fn free_local_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    Ok(listener.local_addr()?.port())
}
