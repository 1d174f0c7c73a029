//! Wi-Fi control flows.
//!
//! Radio bring-up and scan results settle asynchronously on the board, so
//! these flows poll with bounded attempts rather than waiting for change
//! notifications the command channel cannot deliver.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::remote::RemoteConnection;

use super::{LinkStatus, NetworkManager, RetryUntil};

/// Attempts to observe the radio reporting `enabled` after switching it on.
const RADIO_POLL_ATTEMPTS: u32 = 10;

/// Attempts to observe a target SSID in scan results after a rescan.
const SCAN_POLL_ATTEMPTS: u32 = 10;

/// Seconds nmcli may wait for association when connecting.
const CONNECT_WAIT_SECS: &str = "30";

/// Timeout for the connect invocation itself; association takes longer
/// than the default command timeout allows.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

/// Connect the board to `ssid`.
///
/// Brings the radio up, waits for the SSID to become visible, then issues
/// the connect. A non-empty password rides the interactive channel.
pub async fn connect(conn: Arc<dyn RemoteConnection>, ssid: &str, password: &str) -> Result<()> {
    let nm = NetworkManager::new(Arc::clone(&conn));
    ensure_radio_on(&nm).await?;

    nm.run(&["device", "wifi", "rescan"]).await?;
    nm.run_until_success(RetryUntil {
        command: &["-t", "-f", "SSID", "device", "wifi", "list"],
        expected: ssid,
        attempts: SCAN_POLL_ATTEMPTS,
    })
    .await?;

    let connect_nm = NetworkManager::new(conn).with_timeout(CONNECT_TIMEOUT);
    if password.is_empty() {
        connect_nm
            .run(&["--wait", CONNECT_WAIT_SECS, "device", "wifi", "connect", ssid])
            .await?;
    } else {
        connect_nm
            .run(&[
                "--wait",
                CONNECT_WAIT_SECS,
                "device",
                "wifi",
                "connect",
                ssid,
                "password",
                password,
            ])
            .await?;
    }
    Ok(())
}

/// SSIDs currently visible to the board, deduplicated, scan-fresh.
pub async fn list_ssids(conn: Arc<dyn RemoteConnection>) -> Result<Vec<String>> {
    let nm = NetworkManager::new(conn);
    ensure_radio_on(&nm).await?;
    nm.run(&["device", "wifi", "rescan"]).await?;

    let out = nm.run(&["-t", "-f", "SSID", "device", "wifi", "list"]).await?;
    let mut seen = HashSet::new();
    let mut ssids = Vec::new();
    for line in out.lines() {
        let ssid = line.trim();
        if ssid.is_empty() || !seen.insert(ssid.to_string()) {
            continue;
        }
        ssids.push(ssid.to_string());
    }
    Ok(ssids)
}

/// Wi-Fi link status.
pub async fn status(conn: Arc<dyn RemoteConnection>) -> Result<LinkStatus> {
    NetworkManager::new(conn).status_by_type("wifi").await
}

async fn ensure_radio_on(nm: &NetworkManager) -> Result<()> {
    nm.run(&["radio", "wifi", "on"]).await?;
    nm.run_until_success(RetryUntil {
        command: &["radio", "wifi"],
        expected: "enabled",
        attempts: RADIO_POLL_ATTEMPTS,
    })
    .await
}
