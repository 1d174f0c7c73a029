//! Connection stub backing an unselected board.

use async_trait::async_trait;

use super::{FileStat, InteractiveChild, RemoteCommand, RemoteConnection};
use crate::error::{Error, Result};

/// Connection installed on a board before any real one is established.
///
/// Every operation fails with [`Error::NoConnection`] instead of panicking,
/// so call sites never have to null-check the currently selected board.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConnection;

#[async_trait]
impl RemoteConnection for NoopConnection {
    async fn forward(&self, _host_port: u16, _target_port: u16) -> Result<()> {
        Err(Error::NoConnection)
    }

    async fn forward_stop(&self, _host_port: u16) -> Result<()> {
        Err(Error::NoConnection)
    }

    async fn forward_kill_all(&self) -> Result<()> {
        Err(Error::NoConnection)
    }

    fn command(&self, _program: &str, _args: &[&str]) -> Box<dyn RemoteCommand> {
        Box::new(NoopCommand)
    }

    async fn stat(&self, _path: &str) -> Result<FileStat> {
        Err(Error::NoConnection)
    }
}

struct NoopCommand;

#[async_trait]
impl RemoteCommand for NoopCommand {
    async fn output(self: Box<Self>) -> Result<Vec<u8>> {
        Err(Error::NoConnection)
    }

    async fn interactive(self: Box<Self>) -> Result<Box<dyn InteractiveChild>> {
        Err(Error::NoConnection)
    }
}
