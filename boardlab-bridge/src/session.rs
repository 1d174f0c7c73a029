//! Board selection registry and application lifecycle boundaries.
//!
//! The session owns everything with a lifetime longer than one call: the
//! discovery seam, the once-per-process tooling installation, the detected
//! boards, and the single selected board. Selection is an explicit state
//! transition rather than a field copy, so the "at most one live
//! connection" invariant holds structurally instead of by comment.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::board::Board;
use crate::discovery::Discovery;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Owns board detection and the currently selected board.
///
/// `selected` starts as the no-op board, so every call path is valid before
/// the first selection and after a failed one.
pub struct Session {
    discovery: Arc<dyn Discovery>,
    tooling: OnceCell<()>,
    detected: Vec<Board>,
    selected: Board,
}

impl Session {
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self {
            discovery,
            tooling: OnceCell::new(),
            detected: Vec::new(),
            selected: Board::noop(),
        }
    }

    /// Install the discovery tooling, exactly once per session.
    ///
    /// Concurrent callers share one installation run and its cached result;
    /// a failed run is retried by the next caller, success is never reset.
    pub async fn install_tooling(&self) -> Result<()> {
        self.tooling
            .get_or_try_init(|| self.discovery.install_tooling())
            .await?;
        Ok(())
    }

    /// Whether tooling installation has completed.
    pub fn tooling_installed(&self) -> bool {
        self.tooling.initialized()
    }

    /// Enumerate reachable boards.
    ///
    /// Fails fast when called before [`install_tooling`](Self::install_tooling)
    /// completed. Links whose identity hash cannot be derived are skipped
    /// with an error log rather than failing the whole enumeration.
    pub async fn detect_boards(&mut self) -> Result<&[Board]> {
        if !self.tooling_installed() {
            return Err(Error::ToolsNotInstalled);
        }

        let links = self
            .discovery
            .detect()
            .await
            .map_err(|e| Error::Connection(format!("failed to detect boards: {e}")))?;
        if links.is_empty() {
            return Err(Error::NoBoardsFound);
        }

        let mut boards = Vec::with_capacity(links.len());
        for link in links {
            match Board::new(link) {
                Ok(board) => boards.push(board),
                Err(e) => error!(error = %e, "failed to create board instance"),
            }
        }
        self.detected = boards;
        Ok(&self.detected)
    }

    /// Select a detected board by id, establishing its connection.
    ///
    /// The new board connects first; only then is the previous selection
    /// released (tunnels closed, connection dropped) and the new board
    /// installed. A failed establish returns the board to the detected set
    /// and leaves the current selection untouched. Selecting consumes the
    /// detected entry, so re-selecting the same board requires a fresh
    /// detection pass.
    pub async fn select_board(&mut self, id: &str, password: &str) -> Result<()> {
        let idx = self
            .detected
            .iter()
            .position(|b| b.id() == id)
            .ok_or_else(|| Error::BoardNotFound(id.to_string()))?;

        let mut board = self.detected.swap_remove(idx);
        if let Err(e) = board.establish_connection(password).await {
            self.detected.push(board);
            return Err(e);
        }
        self.install(board).await;
        Ok(())
    }

    /// On-device path: when this process runs on the board itself, select
    /// the first detected board over the local protocol, no credential.
    pub async fn select_host_board(&mut self) -> Result<()> {
        if !self.discovery.is_board_host() {
            return Err(Error::NotBoardHost);
        }

        self.detect_boards().await?;
        if self.detected.is_empty() {
            return Err(Error::NoBoardsFound);
        }

        let mut board = self.detected.swap_remove(0);
        if let Err(e) = board.establish_connection("").await {
            self.detected.push(board);
            return Err(e);
        }
        self.install(board).await;
        Ok(())
    }

    /// The currently selected board (the no-op board before any selection).
    pub fn selected(&self) -> &Board {
        &self.selected
    }

    pub fn selected_mut(&mut self) -> &mut Board {
        &mut self.selected
    }

    pub fn detected(&self) -> &[Board] {
        &self.detected
    }

    /// Application shutdown boundary: release the selected board's tunnels.
    ///
    /// After the per-tunnel teardown, the connection's bulk kill sweeps up
    /// any forward the transport still tracks; the no-op board rejects the
    /// sweep, which is expected and only logged.
    pub async fn shutdown(&mut self) {
        self.selected.close_tunnels().await;
        if let Err(e) = self.selected.connection().forward_kill_all().await {
            debug!(error = %e, "forward sweep on shutdown");
        }
    }

    /// Release the previous selection, then install the new board.
    async fn install(&mut self, board: Board) {
        self.selected.close_tunnels().await;
        // The previous connection drops with the board it belongs to.
        self.selected = board;
    }
}
