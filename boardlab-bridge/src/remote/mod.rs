//! Capability contracts for talking to a board.
//!
//! A [`RemoteConnection`] is the transport-agnostic handle supplied by the
//! discovery library once a board is connected: raw TCP port forwarding,
//! remote command execution (batch and interactive), and file metadata
//! probes. This crate only consumes the contract; serial, network, and
//! loopback transports each implement it on their side of the seam.
//!
//! Forwards are tracked per host port: [`RemoteConnection::forward_stop`]
//! tears down a single forward without disturbing siblings on the same
//! connection, while [`RemoteConnection::forward_kill_all`] is reserved for
//! session shutdown boundaries.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub mod noop;

pub use noop::NoopConnection;

/// Metadata returned by [`RemoteConnection::stat`].
#[derive(Debug, Clone)]
pub struct FileStat {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Writable stream handed out by an interactive command.
pub type InputStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Readable stream handed out by an interactive command.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Live transport handle for one board.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Forward local `host_port` to board-side `target_port`.
    ///
    /// Implementations must report a taken local port as
    /// [`Error::HostPortBusy`](crate::error::Error::HostPortBusy) so the
    /// caller can retry on another port; any other failure is final.
    async fn forward(&self, host_port: u16, target_port: u16) -> Result<()>;

    /// Tear down the forward bound to `host_port`.
    async fn forward_stop(&self, host_port: u16) -> Result<()>;

    /// Tear down every forward on this connection.
    async fn forward_kill_all(&self) -> Result<()>;

    /// Build a remote command; nothing runs until the command is consumed.
    fn command(&self, program: &str, args: &[&str]) -> Box<dyn RemoteCommand>;

    /// File metadata probe on the board filesystem.
    async fn stat(&self, path: &str) -> Result<FileStat>;
}

/// A command prepared against a [`RemoteConnection`].
#[async_trait]
pub trait RemoteCommand: Send {
    /// Run to completion and collect stdout.
    async fn output(self: Box<Self>) -> Result<Vec<u8>>;

    /// Start the command with split input/output streams.
    ///
    /// Used for invocations that must receive a secret over stdin instead
    /// of carrying it in the argument list.
    async fn interactive(self: Box<Self>) -> Result<Box<dyn InteractiveChild>>;
}

/// A running interactive command.
///
/// Callers write input, close stdin, then [`wait`](Self::wait) for the exit
/// status; close-time errors must surface through `wait` rather than being
/// dropped.
#[async_trait]
pub trait InteractiveChild: Send {
    fn stdin(&mut self) -> &mut InputStream;
    fn stdout(&mut self) -> &mut OutputStream;
    fn stderr(&mut self) -> &mut OutputStream;

    /// Close the input stream, signalling end of input to the remote process.
    async fn close_stdin(&mut self) -> Result<()>;

    /// Wait for the remote process to exit.
    async fn wait(self: Box<Self>) -> Result<()>;
}
