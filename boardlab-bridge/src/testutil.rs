//! Shared test doubles for the remote connection contract.
//!
//! Commands are scripted by their full command line (program plus joined
//! arguments); unscripted commands succeed with empty output so incidental
//! invocations don't need boilerplate. Scripts queue per command line, and
//! the last entry is sticky so polling loops can be driven with one entry.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::board::BoardInfo;
use crate::discovery::{BoardLink, Discovery};
use crate::error::{Error, Result};
use crate::remote::{
    FileStat, InputStream, InteractiveChild, OutputStream, RemoteCommand, RemoteConnection,
};

/// Scripted response for one command invocation.
#[derive(Clone)]
pub enum CmdScript {
    /// Batch output to return.
    Output(&'static str),
    /// Fail with a command error.
    Fail(&'static str),
    /// Sleep this long before returning output (for timeout tests).
    Slow(Duration, &'static str),
    /// Interactive child with this canned stdout.
    Interactive(&'static str),
}

/// Scripted outcome for one forward attempt; the default is success.
pub enum ForwardScript {
    Busy,
    Fail(&'static str),
}

#[derive(Default)]
struct FakeState {
    scripts: HashMap<String, Vec<CmdScript>>,
    calls: Vec<String>,
    forward_calls: Vec<(u16, u16)>,
    forward_script: Vec<ForwardScript>,
    stopped: Vec<u16>,
    kill_all_calls: u32,
    fail_forward_stop: bool,
    stat_paths: HashSet<String>,
    stdin_captured: Arc<Mutex<Vec<u8>>>,
}

impl FakeState {
    fn next_script(&mut self, line: &str) -> CmdScript {
        self.calls.push(line.to_string());
        match self.scripts.get_mut(line) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => CmdScript::Output(""),
        }
    }
}

/// Scripted in-memory stand-in for a live board connection.
///
/// Clones share state, so the handle kept by a test observes everything
/// the code under test did with its own clone.
#[derive(Clone, Default)]
pub struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the given full command line.
    pub fn script(&self, command_line: &str, script: CmdScript) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .entry(command_line.to_string())
            .or_default()
            .push(script);
    }

    /// Queue an outcome for the next forward attempt.
    pub fn script_forward(&self, outcome: ForwardScript) {
        self.state.lock().unwrap().forward_script.push(outcome);
    }

    /// Make `forward_stop` fail from now on.
    pub fn fail_forward_stop(&self) {
        self.state.lock().unwrap().fail_forward_stop = true;
    }

    /// Mark a path as present for `stat`.
    pub fn stat_exists(&self, path: &str) {
        self.state.lock().unwrap().stat_paths.insert(path.to_string());
    }

    /// Every command line issued, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// How many times the given command line ran.
    pub fn calls_of(&self, command_line: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == command_line)
            .count()
    }

    /// Every forward attempt as `(host_port, target_port)`, in order.
    pub fn forward_calls(&self) -> Vec<(u16, u16)> {
        self.state.lock().unwrap().forward_calls.clone()
    }

    /// Host ports whose forwards were individually stopped.
    pub fn stopped_forwards(&self) -> Vec<u16> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn kill_all_calls(&self) -> u32 {
        self.state.lock().unwrap().kill_all_calls
    }

    /// Everything written to the most recent interactive child's stdin.
    pub fn stdin_captured(&self) -> Vec<u8> {
        let handle = Arc::clone(&self.state.lock().unwrap().stdin_captured);
        let captured = handle.lock().unwrap();
        captured.clone()
    }
}

#[async_trait]
impl RemoteConnection for FakeConnection {
    async fn forward(&self, host_port: u16, target_port: u16) -> Result<()> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.forward_calls.push((host_port, target_port));
            if state.forward_script.is_empty() {
                None
            } else {
                Some(state.forward_script.remove(0))
            }
        };
        match outcome {
            None => Ok(()),
            Some(ForwardScript::Busy) => Err(Error::HostPortBusy(host_port)),
            Some(ForwardScript::Fail(msg)) => Err(Error::Connection(msg.to_string())),
        }
    }

    async fn forward_stop(&self, host_port: u16) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_forward_stop {
            return Err(Error::Connection("forward already gone".to_string()));
        }
        state.stopped.push(host_port);
        Ok(())
    }

    async fn forward_kill_all(&self) -> Result<()> {
        self.state.lock().unwrap().kill_all_calls += 1;
        Ok(())
    }

    fn command(&self, program: &str, args: &[&str]) -> Box<dyn RemoteCommand> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        Box::new(FakeCommand {
            line,
            state: Arc::clone(&self.state),
        })
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        let state = self.state.lock().unwrap();
        if state.stat_paths.contains(path) {
            Ok(FileStat {
                path: path.to_string(),
                size: 0,
                is_dir: false,
            })
        } else {
            Err(Error::Command(format!("stat {path}: no such file or directory")))
        }
    }
}

struct FakeCommand {
    line: String,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl RemoteCommand for FakeCommand {
    async fn output(self: Box<Self>) -> Result<Vec<u8>> {
        let script = self.state.lock().unwrap().next_script(&self.line);
        match script {
            CmdScript::Output(out) => Ok(out.as_bytes().to_vec()),
            CmdScript::Fail(msg) => Err(Error::Command(msg.to_string())),
            CmdScript::Slow(delay, out) => {
                tokio::time::sleep(delay).await;
                Ok(out.as_bytes().to_vec())
            }
            CmdScript::Interactive(_) => {
                Err(Error::Command("scripted as interactive".to_string()))
            }
        }
    }

    async fn interactive(self: Box<Self>) -> Result<Box<dyn InteractiveChild>> {
        let script = {
            let mut state = self.state.lock().unwrap();
            state.next_script(&self.line)
        };
        let canned = match script {
            CmdScript::Interactive(out) => out,
            _ => return Err(Error::Command("not scripted as interactive".to_string())),
        };

        let captured = Arc::new(Mutex::new(Vec::new()));
        self.state.lock().unwrap().stdin_captured = Arc::clone(&captured);
        Ok(Box::new(FakeChild {
            stdin: Box::new(SharedBuf(captured)),
            stdout: Box::new(std::io::Cursor::new(canned.as_bytes().to_vec())),
            stderr: Box::new(std::io::Cursor::new(Vec::new())),
        }))
    }
}

struct FakeChild {
    stdin: InputStream,
    stdout: OutputStream,
    stderr: OutputStream,
}

#[async_trait]
impl InteractiveChild for FakeChild {
    fn stdin(&mut self) -> &mut InputStream {
        &mut self.stdin
    }

    fn stdout(&mut self) -> &mut OutputStream {
        &mut self.stdout
    }

    fn stderr(&mut self) -> &mut OutputStream {
        &mut self.stderr
    }

    async fn close_stdin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn wait(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// AsyncWrite sink that appends into a shared buffer.
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Board link double wrapping a [`FakeConnection`].
pub struct FakeLink {
    info: BoardInfo,
    conn: FakeConnection,
    credentials: Arc<Mutex<Vec<Option<String>>>>,
    fail_connect: bool,
}

impl FakeLink {
    pub fn new(info: BoardInfo, conn: FakeConnection) -> Self {
        Self {
            info,
            conn,
            credentials: Arc::new(Mutex::new(Vec::new())),
            fail_connect: false,
        }
    }

    /// A link whose `connect` always fails.
    pub fn failing(info: BoardInfo, conn: FakeConnection) -> Self {
        Self {
            fail_connect: true,
            ..Self::new(info, conn)
        }
    }

    /// Handle observing every credential passed to `connect`.
    pub fn credentials(&self) -> Arc<Mutex<Vec<Option<String>>>> {
        Arc::clone(&self.credentials)
    }
}

#[async_trait]
impl BoardLink for FakeLink {
    fn info(&self) -> &BoardInfo {
        &self.info
    }

    async fn connect(&self, credential: Option<&str>) -> Result<Arc<dyn RemoteConnection>> {
        self.credentials
            .lock()
            .unwrap()
            .push(credential.map(String::from));
        if self.fail_connect {
            return Err(Error::Connection("connection refused".to_string()));
        }
        Ok(Arc::new(self.conn.clone()))
    }
}

/// Discovery double handing out a fixed set of links.
pub struct FakeDiscovery {
    links: Mutex<Vec<Arc<dyn BoardLink>>>,
    installs: Mutex<u32>,
    fail_install: bool,
    host: bool,
}

impl FakeDiscovery {
    pub fn new(links: Vec<Arc<dyn BoardLink>>) -> Self {
        Self {
            links: Mutex::new(links),
            installs: Mutex::new(0),
            fail_install: false,
            host: false,
        }
    }

    pub fn failing_install(links: Vec<Arc<dyn BoardLink>>) -> Self {
        Self {
            fail_install: true,
            ..Self::new(links)
        }
    }

    pub fn on_host(links: Vec<Arc<dyn BoardLink>>) -> Self {
        Self {
            host: true,
            ..Self::new(links)
        }
    }

    pub fn install_count(&self) -> u32 {
        *self.installs.lock().unwrap()
    }
}

#[async_trait]
impl Discovery for FakeDiscovery {
    async fn install_tooling(&self) -> Result<()> {
        *self.installs.lock().unwrap() += 1;
        if self.fail_install {
            return Err(Error::Connection("archive unpack failed".to_string()));
        }
        Ok(())
    }

    async fn detect(&self) -> Result<Vec<Arc<dyn BoardLink>>> {
        Ok(self.links.lock().unwrap().clone())
    }

    fn is_board_host(&self) -> bool {
        self.host
    }
}
