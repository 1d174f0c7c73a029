//! Read-only status queries over the network manager.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::remote::RemoteConnection;

use super::NetworkManager;

/// Connection status of a device class, mapped from `nmcli` device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Connecting,
    Disconnected,
}

impl NetworkManager {
    /// Status of the device of `dev_type` (e.g. `wifi`, `ethernet`).
    ///
    /// A device that is neither connected nor connecting, or that does not
    /// appear in the listing at all, reads as disconnected. The terse
    /// listing always succeeds on the board, so absence is not an error.
    pub async fn status_by_type(&self, dev_type: &str) -> Result<LinkStatus> {
        // -t terse output, -f select the TYPE,STATE columns
        let out = self
            .run(&["-t", "-f", "TYPE,STATE", "device"])
            .await
            .map_err(|e| Error::Command(format!("failed to query devices: {e}")))?;

        for line in out.lines() {
            let mut parts = line.splitn(2, ':');
            let (Some(dtype), Some(state)) = (parts.next(), parts.next()) else {
                continue;
            };
            if dtype != dev_type {
                continue;
            }
            match state.trim() {
                "connected" => return Ok(LinkStatus::Connected),
                "connecting" => return Ok(LinkStatus::Connecting),
                _ => {}
            }
        }
        Ok(LinkStatus::Disconnected)
    }

    /// Whether the board reports full internet connectivity.
    pub async fn internet_reachable(&self) -> Result<bool> {
        let out = self
            .run(&["networking", "connectivity", "check"])
            .await
            .map_err(|e| Error::Command(format!("failed to query internet connectivity: {e}")))?;
        Ok(out.trim() == "full")
    }

    /// Name of the active connection, or `None` when nothing is active.
    ///
    /// "No active connection" is a valid, error-free result, distinct from
    /// a failed query.
    pub async fn active_connection_name(&self) -> Result<Option<String>> {
        // -t terse output, -f select the NAME column
        let out = self
            .run(&["-t", "-f", "NAME", "connection", "show", "--active"])
            .await
            .map_err(|e| Error::Command(format!("failed to query connection: {e}")))?;

        let first = out.lines().next().unwrap_or("").trim();
        if first.is_empty() {
            return Ok(None);
        }
        Ok(Some(first.to_string()))
    }
}

/// Internet reachability over a fresh default-timeout manager.
pub async fn internet_status(conn: Arc<dyn RemoteConnection>) -> Result<bool> {
    NetworkManager::new(conn).internet_reachable().await
}

/// Active connection name over a fresh default-timeout manager.
pub async fn connection_name(conn: Arc<dyn RemoteConnection>) -> Result<Option<String>> {
    NetworkManager::new(conn).active_connection_name().await
}
