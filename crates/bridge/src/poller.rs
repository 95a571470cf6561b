//! HTTP polling of the AirGradient status endpoint.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::status::AirGradientStatus;

/// Devices on the LAN answer quickly; anything slower than this is a stall.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Poller {
    client: reqwest::Client,
    url: String,
}

impl Poller {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, url: url.to_string() })
    }

    /// Fetch and decode one status document, deriving the AQI field.
    pub async fn fetch(&self) -> Result<AirGradientStatus> {
        let mut status: AirGradientStatus = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", self.url))?
            .json()
            .await
            .with_context(|| format!("failed to decode status json from {}", self.url))?;
        status.derive_aqi();
        Ok(status)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
