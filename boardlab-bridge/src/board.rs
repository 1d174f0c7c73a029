//! Board identity, connection establishment, and tunnel ownership.
//!
//! A [`Board`] aggregates the discovery metadata for one physical device,
//! the live [`RemoteConnection`] once one is established, and the port
//! forwards opened over it. Connection establishment dispatches on the
//! discovery protocol: serial and network boards reach board-local TCP
//! services through a forwarded tunnel, a loopback-local board does not.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::discovery::{BoardLink, NoopLink};
use crate::error::{Error, Result};
use crate::network::NetworkManager;
use crate::remote::{NoopConnection, RemoteConnection};
use crate::tracing::prelude::*;
use crate::tunnel::Tunnel;

/// Tag of the tunnel carrying the orchestrator HTTP API.
pub const ORCHESTRATOR_TUNNEL_TAG: &str = "orchestrator";

/// Board-side TCP port the orchestrator listens on.
pub const ORCHESTRATOR_PORT: u16 = 8800;

/// File present on every flashed (non-day-zero) image.
const BUILD_INFO_PATH: &str = "/etc/buildinfo";

/// Login user provisioned on board images.
const BOARD_USER: &str = "maker";

/// Transport protocol a board was discovered over. Immutable once discovered.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    Serial,
    Network,
    Local,
    /// Anything the discovery library reports that this core does not speak.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Discovery metadata for one board, as reported by the discovery library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardInfo {
    pub protocol: Protocol,
    /// Serial port device node, when discovered over serial.
    #[serde(default)]
    pub serial: String,
    /// Network address, when discovered over the network.
    #[serde(default)]
    pub address: String,
    /// Product name reported by discovery.
    #[serde(default)]
    pub board_name: String,
    /// User-assigned display name, when one was stored on the board.
    #[serde(default)]
    pub custom_name: String,
}

/// One managed board.
///
/// A board either has no live connection and no tunnels, or exactly one
/// live connection and zero-or-more tunnels bound to it; tunnels never
/// outlive the connection they forward over.
pub struct Board {
    id: String,
    link: Arc<dyn BoardLink>,
    conn: Arc<dyn RemoteConnection>,
    tunnels: Vec<Tunnel>,
}

impl Board {
    /// Wrap a discovery link, deriving the stable identifier.
    ///
    /// The id is a content hash of the discovery metadata, so the same
    /// physical board gets the same id across discovery runs.
    pub fn new(link: Arc<dyn BoardLink>) -> Result<Self> {
        let id = hash_info(link.info())?;
        Ok(Self {
            id,
            link,
            conn: Arc::new(NoopConnection),
            tunnels: Vec::new(),
        })
    }

    /// Safe default before any board is selected.
    ///
    /// Every remote operation on it fails with [`Error::NoConnection`]
    /// instead of panicking.
    pub fn noop() -> Self {
        Self {
            id: String::new(),
            link: Arc::new(NoopLink::new()),
            conn: Arc::new(NoopConnection),
            tunnels: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info(&self) -> &BoardInfo {
        self.link.info()
    }

    /// Handle to the live connection (the no-op stub before establishment).
    pub fn connection(&self) -> Arc<dyn RemoteConnection> {
        Arc::clone(&self.conn)
    }

    pub fn tunnels(&self) -> &[Tunnel] {
        &self.tunnels
    }

    /// Establish the protocol-appropriate connection.
    ///
    /// Serial and network boards also get the orchestrator tunnel; a serial
    /// connect additionally kicks off a background task that enables board
    /// networking when it is off, whose outcome is only ever logged. The
    /// connection is installed only after every synchronous step succeeded.
    pub async fn establish_connection(&mut self, password: &str) -> Result<()> {
        let protocol = self.info().protocol;
        let conn = match protocol {
            Protocol::Serial => {
                let conn = self.acquire(None).await?;
                self.start_tunnel_on(Arc::clone(&conn), ORCHESTRATOR_TUNNEL_TAG, ORCHESTRATOR_PORT)
                    .await?;
                spawn_enable_networking(Arc::clone(&conn));
                conn
            }
            Protocol::Network => {
                if password.is_empty() {
                    return Err(Error::PasswordRequired);
                }
                let conn = self.acquire(Some(password)).await?;
                self.start_tunnel_on(Arc::clone(&conn), ORCHESTRATOR_TUNNEL_TAG, ORCHESTRATOR_PORT)
                    .await?;
                conn
            }
            Protocol::Local => self.acquire(None).await?,
            Protocol::Unknown => {
                return Err(Error::UnsupportedProtocol(protocol.to_string()));
            }
        };

        self.conn = conn;
        Ok(())
    }

    /// Open a tunnel to `target_port` over the board's live connection.
    ///
    /// Idempotent per board-side port: an existing tunnel to `target_port`
    /// is returned as-is, so there is never more than one forward per
    /// board-side port.
    pub async fn start_tunnel(&mut self, tag: &str, target_port: u16) -> Result<&Tunnel> {
        let conn = Arc::clone(&self.conn);
        self.start_tunnel_on(conn, tag, target_port).await
    }

    async fn start_tunnel_on(
        &mut self,
        conn: Arc<dyn RemoteConnection>,
        tag: &str,
        target_port: u16,
    ) -> Result<&Tunnel> {
        if let Some(idx) = self
            .tunnels
            .iter()
            .position(|t| t.target_port() == target_port)
        {
            return Ok(&self.tunnels[idx]);
        }

        let tunnel = Tunnel::open(conn, tag, target_port)
            .await
            .map_err(|e| Error::Connection(format!("failed to start tunnel: {e}")))?;
        let idx = self.tunnels.len();
        self.tunnels.push(tunnel);
        Ok(&self.tunnels[idx])
    }

    /// Close every tunnel owned by this board.
    ///
    /// Individual close failures are logged, never propagated; the tunnel
    /// collection is cleared unconditionally.
    pub async fn close_tunnels(&mut self) {
        if self.tunnels.is_empty() {
            info!("tunnels already closed");
        }

        for tunnel in &mut self.tunnels {
            if let Err(e) = tunnel.close().await {
                error!(tag = tunnel.tag(), error = %e, "failed to close tunnel");
            }
        }
        self.tunnels.clear();
    }

    /// Base URL of the orchestrator API behind its tunnel.
    ///
    /// Errors when the board has no tunnels or none carries the
    /// orchestrator tag; being connected is a precondition for asking.
    pub fn orchestrator_url(&self) -> Result<String> {
        if self.tunnels.is_empty() {
            return Err(Error::NoTunnels);
        }

        let tunnel = self
            .tunnels
            .iter()
            .find(|t| t.tag() == ORCHESTRATOR_TUNNEL_TAG)
            .ok_or(Error::NoOrchestratorTunnel)?;
        let port = tunnel
            .port()
            .map_err(|e| Error::Connection(format!("failed to get orchestrator tunnel port: {e}")))?;
        Ok(format!("http://localhost:{port}"))
    }

    /// Whether the board runs a day-zero image.
    ///
    /// Flashed images carry a build-info file; a failed stat is taken to
    /// mean the build metadata is absent.
    pub async fn is_r0_build(&self) -> bool {
        self.conn.stat(BUILD_INFO_PATH).await.is_err()
    }

    /// Display name stored on the board.
    pub async fn name(&self) -> Result<String> {
        let out = self
            .conn
            .command("cat", &["/etc/hostname"])
            .output()
            .await
            .map_err(|e| Error::Command(format!("failed to read board name: {e}")))?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    /// Store a new display name on the board.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.conn
            .command("hostnamectl", &["set-hostname", name])
            .output()
            .await
            .map_err(|e| Error::Command(format!("failed to set board name: {e}")))?;
        Ok(())
    }

    /// Whether the board user has a usable password.
    pub async fn is_user_password_set(&self) -> Result<bool> {
        let out = self
            .conn
            .command("passwd", &["-S", BOARD_USER])
            .output()
            .await
            .map_err(|e| Error::Command(format!("failed to query password status: {e}")))?;
        let text = String::from_utf8_lossy(&out);
        Ok(text.split_whitespace().nth(1) == Some("P"))
    }

    /// Set the board user's password over the interactive channel.
    ///
    /// The secret is written to `passwd` on stdin (twice, once per prompt)
    /// and never appears in an argument list. Close-time errors accumulate
    /// into the returned error.
    pub async fn set_user_password(&self, password: &str) -> Result<()> {
        let mut child = self
            .conn
            .command("passwd", &[BOARD_USER])
            .interactive()
            .await
            .map_err(|e| Error::Command(format!("interactive passwd failed: {e}")))?;

        let mut failures: Vec<String> = Vec::new();
        for _ in 0..2 {
            if let Err(e) = child
                .stdin()
                .write_all(format!("{password}\n").as_bytes())
                .await
            {
                failures.push(format!("stdin write failed: {e}"));
                break;
            }
        }
        if let Err(e) = child.close_stdin().await {
            failures.push(format!("stdin close failed: {e}"));
        }
        if let Err(e) = child.wait().await {
            failures.push(format!("passwd exit failed: {e}"));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Command(failures.join("; ")))
        }
    }

    async fn acquire(&self, credential: Option<&str>) -> Result<Arc<dyn RemoteConnection>> {
        self.link
            .connect(credential)
            .await
            .map_err(|e| Error::Connection(format!("failed to connect to board: {e}")))
    }
}

/// Background step after a serial connect: boards freshly out of the box
/// have networking off, and the UI needs it on to talk Wi-Fi. Failures are
/// logged, never surfaced; connection establishment already succeeded.
fn spawn_enable_networking(conn: Arc<dyn RemoteConnection>) {
    tokio::spawn(async move {
        let nm = NetworkManager::new(conn);
        match nm.networking_enabled().await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = nm.enable_networking().await {
                    error!(error = %e, "failed to enable network mode");
                }
            }
            Err(e) => error!(error = %e, "failed to get network mode status"),
        }
    });
}

fn hash_info(info: &BoardInfo) -> Result<String> {
    let encoded = serde_json::to_vec(info)?;
    Ok(hex::encode(Sha256::digest(encoded)))
}
