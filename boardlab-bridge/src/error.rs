//! Common error types for boardlab-bridge.
//!
//! This module provides a centralized Error enum using thiserror. Variants
//! that call sites need to match on (missing password, busy local port,
//! exhausted retry budget, ...) carry structured payloads; plain wrapping
//! variants carry the operation context as a string.

use std::time::Duration;

use thiserror::Error;

/// Main error type for boardlab-bridge operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No board is connected; raised by the no-op connection stub.
    #[error("no active connection to the board")]
    NoConnection,

    /// A network-protocol board was selected without a credential.
    #[error("password is required to connect to a network protocol board")]
    PasswordRequired,

    /// The discovery library reported a protocol this core does not speak.
    #[error("unsupported board protocol: {0}")]
    UnsupportedProtocol(String),

    /// No detected board carries the requested identifier.
    #[error("board with id {0} not found")]
    BoardNotFound(String),

    /// Detection was attempted before the discovery tooling was installed.
    #[error("detection tools not installed")]
    ToolsNotInstalled,

    /// Detection ran but produced no usable boards.
    #[error("no boards found")]
    NoBoardsFound,

    /// The host-board selection path was taken off-device.
    #[error("not running on a board host")]
    NotBoardHost,

    /// The requested local port is taken; forwarding may retry elsewhere.
    #[error("local port {0} is already in use")]
    HostPortBusy(u16),

    /// The board has no active tunnels.
    #[error("no active tunnels")]
    NoTunnels,

    /// No tunnel carries the orchestrator tag.
    #[error("no orchestrator tunnel found")]
    NoOrchestratorTunnel,

    /// The tunnel was never established or has already been closed.
    #[error("tunnel is not established")]
    TunnelClosed,

    /// A network manager command exceeded its configured timeout.
    #[error("network manager command {command:?} timed out after {timeout:?}")]
    CommandTimeout {
        command: String,
        timeout: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    /// A polled command never produced the expected output.
    #[error("command {command:?} did not return expected output {expected:?} after {attempts} attempts")]
    RetryExhausted {
        command: String,
        expected: String,
        attempts: u32,
    },

    /// Connection establishment or forwarding errors.
    #[error("connection error: {0}")]
    Connection(String),

    /// Remote command execution errors.
    #[error("command error: {0}")]
    Command(String),

    /// I/O errors from tokio or std.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Board metadata (de)serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
