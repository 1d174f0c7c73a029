//! Driving the board-side NetworkManager CLI over a remote connection.
//!
//! The board configures its network stack with `nmcli`. Radio bring-up and
//! scan completion are asynchronous on the board and nothing pushes change
//! notifications over the command channel, so the driver offers bounded
//! polling ([`NetworkManager::run_until_success`]) next to one-shot runs.
//! Secrets never travel in an argument list: a `password <value>` pair is
//! extracted and submitted over the interactive channel instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time;

use crate::error::{Error, Result};
use crate::remote::RemoteConnection;

pub mod ethernet;
pub mod status;
pub mod wifi;

pub use status::LinkStatus;

/// The network configuration CLI present on board images.
const NMCLI: &str = "nmcli";

/// Default per-call timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between attempts in [`NetworkManager::run_until_success`].
const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// One `nmcli` driver bound to a remote connection.
///
/// Stateless apart from its timeout; construct one per operation.
pub struct NetworkManager {
    timeout: Duration,
    conn: Arc<dyn RemoteConnection>,
}

/// Poll configuration for [`NetworkManager::run_until_success`].
pub struct RetryUntil<'a> {
    pub command: &'a [&'a str],
    pub expected: &'a str,
    pub attempts: u32,
}

impl NetworkManager {
    pub fn new(conn: Arc<dyn RemoteConnection>) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            conn,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `nmcli` with `args`, bounded by the configured timeout.
    ///
    /// An argument list carrying a literal `password` token followed by a
    /// value is routed through the interactive channel so the secret never
    /// appears on a process command line; everything else runs batch.
    /// Trimmed stdout is the result. Deadline expiry yields
    /// [`Error::CommandTimeout`], distinct from ordinary command failure.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        match time::timeout(self.timeout, self.run_inner(args)).await {
            Ok(result) => result,
            Err(elapsed) => Err(Error::CommandTimeout {
                command: args.join(" "),
                timeout: self.timeout,
                source: elapsed,
            }),
        }
    }

    /// Rerun `command` until its output contains `expected`.
    ///
    /// Attempts are separated by a fixed pause; an exhausted budget yields
    /// [`Error::RetryExhausted`]. A failing run aborts immediately.
    pub async fn run_until_success(&self, cfg: RetryUntil<'_>) -> Result<()> {
        for attempt in 0..cfg.attempts {
            let out = self.run(cfg.command).await.map_err(|e| {
                Error::Command(format!(
                    "failed to run nmcli {} command: {e}",
                    cfg.command.join(" ")
                ))
            })?;
            if out.contains(cfg.expected) {
                return Ok(());
            }
            if attempt + 1 < cfg.attempts {
                time::sleep(RETRY_INTERVAL).await;
            }
        }

        Err(Error::RetryExhausted {
            command: cfg.command.join(" "),
            expected: cfg.expected.to_string(),
            attempts: cfg.attempts,
        })
    }

    /// Whether board networking is currently enabled.
    pub async fn networking_enabled(&self) -> Result<bool> {
        let out = self.run(&["networking"]).await?;
        Ok(out.trim() == "enabled")
    }

    /// Turn board networking on.
    pub async fn enable_networking(&self) -> Result<()> {
        self.run(&["networking", "on"]).await?;
        Ok(())
    }

    async fn run_inner(&self, args: &[&str]) -> Result<String> {
        match extract_password_arg(args) {
            Some((secret, rest)) => self.run_interactive(&rest, &secret).await,
            None => self.run_batch(args).await,
        }
    }

    async fn run_batch(&self, args: &[&str]) -> Result<String> {
        let out = self
            .conn
            .command(NMCLI, args)
            .output()
            .await
            .map_err(|e| Error::Command(format!("output failed: {e}")))?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    async fn run_interactive(&self, args: &[&str], secret: &str) -> Result<String> {
        let mut child = self
            .conn
            .command(NMCLI, args)
            .interactive()
            .await
            .map_err(|e| Error::Command(format!("interactive exec failed: {e}")))?;

        let mut failures: Vec<String> = Vec::new();
        let mut out = Vec::new();

        if let Err(e) = child.stdin().write_all(format!("{secret}\n").as_bytes()).await {
            failures.push(format!("stdin write failed: {e}"));
        } else if let Err(e) = child.stdout().read_to_end(&mut out).await {
            failures.push(format!("stdout read failed: {e}"));
        }

        // Close-time errors accumulate instead of vanishing.
        if let Err(e) = child.close_stdin().await {
            failures.push(format!("stdin close failed: {e}"));
        }
        if let Err(e) = child.wait().await {
            failures.push(format!("nmcli exit failed: {e}"));
        }

        let out = String::from_utf8_lossy(&out).trim().to_string();
        if failures.is_empty() {
            Ok(out)
        } else {
            Err(Error::Command(format!(
                "{}; output: {out}",
                failures.join("; ")
            )))
        }
    }
}

/// Split the first `password <value>` pair out of an nmcli argument list.
///
/// Returns the secret and the argument list with the pair removed, or None
/// when no such pair exists. A trailing bare `password` token or an empty
/// value is left in place for nmcli itself to reject.
fn extract_password_arg<'a>(args: &[&'a str]) -> Option<(String, Vec<&'a str>)> {
    let pos = args
        .iter()
        .position(|&a| a == "password")
        .filter(|&i| i + 1 < args.len())?;
    let secret = args[pos + 1].trim();
    if secret.is_empty() {
        return None;
    }

    let mut rest = Vec::with_capacity(args.len() - 2);
    rest.extend_from_slice(&args[..pos]);
    rest.extend_from_slice(&args[pos + 2..]);
    Some((secret.to_string(), rest))
}
