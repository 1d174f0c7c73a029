//! Seam to the board discovery library.
//!
//! Board enumeration (FQBN resolution, transport probing) lives in a
//! separate library; this crate consumes it through two small traits. A
//! [`BoardLink`] is the per-board handle discovery hands out: immutable
//! metadata plus a connection factory. [`Discovery`] covers the process-wide
//! concerns: installing the detection tooling and enumerating links.

use std::sync::Arc;

use async_trait::async_trait;

use crate::board::BoardInfo;
use crate::error::{Error, Result};
use crate::remote::RemoteConnection;

/// Per-board handle from the discovery library.
#[async_trait]
pub trait BoardLink: Send + Sync {
    /// Discovery metadata for this board.
    fn info(&self) -> &BoardInfo;

    /// Open a connection to the board.
    ///
    /// `credential` is required by the network protocol and ignored by the
    /// others; the link implementation decides what to do with it.
    async fn connect(&self, credential: Option<&str>) -> Result<Arc<dyn RemoteConnection>>;
}

/// Process-wide discovery operations.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Install the detection tooling this library needs to enumerate boards.
    async fn install_tooling(&self) -> Result<()>;

    /// Enumerate currently reachable boards.
    async fn detect(&self) -> Result<Vec<Arc<dyn BoardLink>>>;

    /// Whether this process runs on a board itself (loopback reachable).
    fn is_board_host(&self) -> bool;
}

/// Link behind the no-op board; connecting always fails.
pub(crate) struct NoopLink {
    info: BoardInfo,
}

impl NoopLink {
    pub(crate) fn new() -> Self {
        Self {
            info: BoardInfo::default(),
        }
    }
}

#[async_trait]
impl BoardLink for NoopLink {
    fn info(&self) -> &BoardInfo {
        &self.info
    }

    async fn connect(&self, _credential: Option<&str>) -> Result<Arc<dyn RemoteConnection>> {
        Err(Error::NoConnection)
    }
}
