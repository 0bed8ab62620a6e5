//! Throughput measurement against a public speed endpoint.

use super::{round2, Probe, ProbeOutcome};
use crate::driver::BrowserSession;
use reqwest::Client;
use serde_json::{json, Map};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SPEED_TIMEOUT: Duration = Duration::from_secs(30);
const SPEED_SERVER: &str = "speed.cloudflare.com";
const DOWNLOAD_BYTES: usize = 10_000_000;
const UPLOAD_BYTES: usize = 1_000_000;

/// Download/upload throughput plus ping against the Cloudflare speed
/// endpoint: timed fixed-size transfers, reported in Mbps/ms at two decimals.
pub struct SpeedProbe {
    client: Client,
    server: String,
}

impl Default for SpeedProbe {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .timeout(SPEED_TIMEOUT)
                .user_agent(crate::TERMUX_USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            server: SPEED_SERVER.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Probe for SpeedProbe {
    fn name(&self) -> &str {
        "network_speed"
    }

    async fn run(&self, _browser: Option<&BrowserSession>) -> ProbeOutcome {
        match self.measure().await {
            Ok(payload) => ProbeOutcome::success(self.name(), payload),
            Err(detail) => {
                warn!(%detail, "speed test failed");
                ProbeOutcome::error(self.name(), detail, Map::new())
            }
        }
    }
}

impl SpeedProbe {
    async fn measure(&self) -> Result<Map<String, serde_json::Value>, String> {
        let ping_ms = self.ping().await?;
        debug!(ping_ms, "ping measured");

        let download_mbps = self.download().await?;
        debug!(download_mbps, "download measured");

        let upload_mbps = self.upload().await?;
        debug!(upload_mbps, "upload measured");

        let mut payload = Map::new();
        payload.insert("download_mbps".into(), json!(download_mbps));
        payload.insert("upload_mbps".into(), json!(upload_mbps));
        payload.insert("ping_ms".into(), json!(ping_ms));
        payload.insert("server".into(), json!(self.server));
        Ok(payload)
    }

    async fn ping(&self) -> Result<f64, String> {
        let url = format!("https://{}/__down?bytes=0", self.server);
        let start = Instant::now();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("ping failed: {e}"))?;
        response
            .bytes()
            .await
            .map_err(|e| format!("ping failed: {e}"))?;
        Ok(round2(start.elapsed().as_secs_f64() * 1000.0))
    }

    async fn download(&self) -> Result<f64, String> {
        let url = format!("https://{}/__down?bytes={}", self.server, DOWNLOAD_BYTES);
        let start = Instant::now();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("download failed: {e}"))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("download failed: {e}"))?;
        Ok(Self::mbps(body.len(), start.elapsed()))
    }

    async fn upload(&self) -> Result<f64, String> {
        let url = format!("https://{}/__up", self.server);
        let body = vec![0u8; UPLOAD_BYTES];
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| format!("upload failed: {e}"))?;
        response
            .bytes()
            .await
            .map_err(|e| format!("upload failed: {e}"))?;
        Ok(Self::mbps(UPLOAD_BYTES, start.elapsed()))
    }

    fn mbps(bytes: usize, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        round2(bytes as f64 * 8.0 / 1_000_000.0 / secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mbps_conversion() {
        // 10 MB in 8 seconds is exactly 10 Mbps.
        let rate = SpeedProbe::mbps(10_000_000, Duration::from_secs(8));
        assert_eq!(rate, 10.0);
    }

    #[test]
    fn mbps_never_divides_by_zero() {
        let rate = SpeedProbe::mbps(1_000_000, Duration::ZERO);
        assert!(rate.is_finite());
    }
}
