//! Connection and tunnel lifecycle core for the BoardLab desktop app.
//!
//! This crate is the backend the UI layer talks to when it manages one
//! embedded board: discovering boards, establishing a protocol-appropriate
//! connection (serial/USB, network, or local loopback), forwarding
//! board-side TCP services to local ports, and driving the board's
//! NetworkManager CLI for Wi-Fi and Ethernet control.
//!
//! # Architecture
//!
//! Transport and discovery internals live behind the [`remote`] and
//! [`discovery`] capability traits; this crate orchestrates on top of them:
//!
//! - [`session::Session`] owns detection, tooling installation, and the
//!   single selected [`board::Board`].
//! - [`board::Board`] drives connection establishment and owns its
//!   [`tunnel::Tunnel`]s; before anything is selected a no-op board stands
//!   in, failing every operation with a well-known error instead of
//!   crashing.
//! - [`network`] runs `nmcli` over the connection's command channel with
//!   per-call timeouts, bounded polling, and interactive secret submission.

pub mod board;
pub mod discovery;
pub mod error;
pub mod network;
pub mod remote;
pub mod session;
pub mod tracing;
pub mod tunnel;

#[cfg(test)]
pub(crate) mod testutil;

pub use board::{Board, BoardInfo, Protocol};
pub use error::{Error, Result};
pub use network::{LinkStatus, NetworkManager};
pub use session::Session;
pub use tunnel::Tunnel;
