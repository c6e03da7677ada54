// src/server.rs

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::EngineError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll `<url>/health` until it answers with a success status.
///
/// The health endpoint is checked at least once, even when `timeout_secs` is zero.
pub async fn wait_for_server_ready(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
) -> Result<(), EngineError> {
    let health_url = format!("{}/health", url.trim_end_matches('/'));
    let timeout = Duration::from_secs(timeout_secs);
    let start = Instant::now();

    loop {
        match client.get(&health_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(url = %url, elapsed_ms = start.elapsed().as_millis() as u64, "Server ready");
                return Ok(());
            }
            Ok(resp) => debug!(status = %resp.status(), "Server not ready yet"),
            Err(e) => debug!(error = %e, "Server not reachable yet"),
        }

        if start.elapsed() >= timeout {
            return Err(EngineError::LocalServer(format!(
                "Server startup timeout after {}s: {}",
                timeout_secs, url
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
