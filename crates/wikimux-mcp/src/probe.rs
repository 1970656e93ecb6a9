//! Application-level health probe for peer discovery.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use wikimux_core::{PeerHealth, PeerPayload};

/// Probe a peer adapter's health endpoint.
///
/// Accepts only the typed health shape; a well-formed JSON reply that is
/// not a health document is still a probe failure.
pub async fn probe_health(
    http: &reqwest::Client,
    health_url: &str,
    timeout: Duration,
) -> Result<PeerHealth> {
    let response = http
        .get(health_url)
        .timeout(timeout)
        .send()
        .await
        .context("Health probe request failed")?;

    if !response.status().is_success() {
        return Err(anyhow!("Health probe returned HTTP {}", response.status()));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .context("Health probe returned invalid JSON")?;

    match PeerPayload::parse(body) {
        PeerPayload::Health(health) => {
            debug!(
                health_url = %health_url,
                server_type = %health.server_type,
                version = %health.version,
                "[PeerProbe] Health probe succeeded"
            );
            Ok(health)
        }
        other => Err(anyhow!(
            "Health probe returned an unexpected payload: {:?}",
            other
        )),
    }
}
