//! Tor daemon lifecycle around the batch

use tokio::process::Command;
use tracing::{info, warn};

/// Starts and stops the system Tor service; invoked once before and once
/// after the batch, regardless of its outcome.
///
/// Failures are logged rather than propagated: if Tor is genuinely down the
/// seed fetch fails on its own, and a failed stop must not mask the batch
/// result.
#[derive(Debug, Default)]
pub struct TorService;

impl TorService {
    pub async fn start(&self) {
        info!("Starting tor service...");
        self.signal("start").await;
    }

    pub async fn stop(&self) {
        info!("Stopping tor service...");
        self.signal("stop").await;
    }

    async fn signal(&self, command: &str) {
        match Command::new("service").args(["tor", command]).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("`service tor {command}` exited with {status}"),
            Err(e) => warn!("failed to {command} the tor service: {e}"),
        }
    }
}
