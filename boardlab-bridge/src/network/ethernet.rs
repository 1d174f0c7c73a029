//! Ethernet status.

use std::sync::Arc;

use crate::error::Result;
use crate::remote::RemoteConnection;

use super::{LinkStatus, NetworkManager};

/// Ethernet link status.
pub async fn status(conn: Arc<dyn RemoteConnection>) -> Result<LinkStatus> {
    NetworkManager::new(conn).status_by_type("ethernet").await
}
