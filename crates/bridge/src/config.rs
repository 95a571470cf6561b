//! TOML config file loading and validation.
//!
//! Only the `[airgradient]` section is required. Each sink section is
//! optional; a sink is active exactly when its section is present (and,
//! for Home Assistant, its `discovery` toggle is on).

use anyhow::{bail, Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    pub airgradient: AirGradientConfig,
    pub mqtt: Option<MqttConfig>,
    pub hass: Option<HassConfig>,
    pub influx: Option<InfluxConfig>,
}

#[derive(Debug, Deserialize)]
pub struct AirGradientConfig {
    /// Status endpoint, e.g. `http://airgradient.local/measures/current`.
    pub url: String,
    /// Seconds between polls.
    #[serde(default = "default_poll_rate")]
    pub poll_rate: u64,
}

#[derive(Debug, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    #[serde(default)]
    pub broker_username: String,
    #[serde(default)]
    pub broker_password: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Middle topic segment. Empty means "default to
    /// `airgradient-{serialno}` on the first successful poll".
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct HassConfig {
    /// Discovery publishing toggle; the section being present implies
    /// intent, so this defaults on.
    #[serde(default = "default_true")]
    pub discovery: bool,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    pub device_name: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub manufacturer: String,
}

#[derive(Debug, Deserialize)]
pub struct InfluxConfig {
    pub hostname: String,
    #[serde(default = "default_influx_port")]
    pub port: u16,
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub measurement: String,
}

fn default_poll_rate() -> u64 {
    60
}

fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "airgradient-bridge".to_string()
}

fn default_topic_prefix() -> String {
    "airgradient".to_string()
}

fn default_true() -> bool {
    true
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_influx_port() -> u16 {
    8086
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all sections. Returns `Ok(())` or an error describing every
    /// violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.airgradient.url.trim().is_empty() {
            errors.push("airgradient.url is empty".to_string());
        }
        if self.airgradient.poll_rate == 0 {
            errors.push("airgradient.poll_rate must be positive".to_string());
        }

        if let Some(m) = &self.mqtt {
            if m.broker_host.trim().is_empty() {
                errors.push("mqtt.broker_host is empty".to_string());
            }
            if m.broker_username.is_empty() != m.broker_password.is_empty() {
                errors.push(
                    "mqtt.broker_username and mqtt.broker_password must be set together"
                        .to_string(),
                );
            }
            if m.topic_prefix.trim().is_empty() {
                errors.push("mqtt.topic_prefix is empty".to_string());
            }
        }

        if let Some(h) = &self.hass {
            if self.mqtt.is_none() {
                errors.push(
                    "hass is configured but mqtt is not - discovery publishes through the MQTT broker"
                        .to_string(),
                );
            }
            if h.device_name.trim().is_empty() {
                errors.push("hass.device_name is empty".to_string());
            }
            if h.discovery_prefix.trim().is_empty() {
                errors.push("hass.discovery_prefix is empty".to_string());
            }
        }

        if let Some(i) = &self.influx {
            if i.hostname.trim().is_empty() {
                errors.push("influx.hostname is empty".to_string());
            }
            if i.database.trim().is_empty() {
                errors.push("influx.database is empty".to_string());
            }
            if i.measurement.trim().is_empty() {
                errors.push("influx.measurement is empty".to_string());
            }
            if i.username.is_empty() != i.password.is_empty() {
                errors.push(
                    "influx.username and influx.password must be set together".to_string(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
