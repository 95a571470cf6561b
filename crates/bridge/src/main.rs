mod aqi;
mod config;
mod hass;
mod influx;
mod mqtt;
mod poller;
mod status;
mod tags;

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::AsyncClient;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, HassConfig};
use influx::InfluxSink;
use poller::Poller;
use status::{AirGradientStatus, FieldTable};

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Bridge context
// ---------------------------------------------------------------------------

struct MqttSink {
    client: AsyncClient,
    prefix: String,
    /// `None` until the first successful poll when the config left the
    /// topic empty; set once to `airgradient-{serialno}` and kept.
    topic: Option<String>,
}

/// Everything the poll loop needs, built once at startup.
struct Bridge {
    poller: Poller,
    table: FieldTable,
    influx: Option<InfluxSink>,
    mqtt: Option<MqttSink>,
    hass: Option<HassConfig>,
}

impl Bridge {
    fn new(config: Config) -> Result<Self> {
        let table = FieldTable::resolve().context("invalid field metadata")?;
        let poller = Poller::new(&config.airgradient.url)?;

        let mqtt = match &config.mqtt {
            Some(cfg) => Some(MqttSink {
                client: mqtt::connect(cfg),
                prefix: cfg.topic_prefix.clone(),
                topic: (!cfg.topic.is_empty()).then(|| cfg.topic.clone()),
            }),
            None => {
                info!("no mqtt configuration found - not publishing to an mqtt broker");
                None
            }
        };

        let influx = config.influx.as_ref().map(InfluxSink::new);
        let hass = config.hass.filter(|h| h.discovery);

        Ok(Self { poller, table, influx, mqtt, hass })
    }

    /// One Polling phase: fetch, derive, dispatch to each active sink in
    /// turn. Per-cycle and per-sink failures are logged and never abort
    /// the loop.
    async fn poll_once(&mut self) {
        match self.poller.fetch().await {
            Ok(status) => self.dispatch(status).await,
            Err(e) => warn!("poll failed: {e:#} - skipping this cycle"),
        }
    }

    async fn dispatch(&mut self, status: AirGradientStatus) {
        if status.serialno.is_empty() {
            warn!("status response carries no serial number - skipping this cycle");
            return;
        }

        if let Some(sink) = &self.influx {
            sink.write(&self.table, &status, now_unix()).await;
        }

        if let Some(sink) = &mut self.mqtt {
            let topic = sink
                .topic
                .get_or_insert_with(|| format!("airgradient-{}", status.serialno))
                .clone();
            mqtt::publish_flat(&sink.client, &self.table, &status, &sink.prefix, &topic).await;

            if let Some(hass_cfg) = &self.hass {
                hass::publish_discovery(&sink.client, hass_cfg, &self.table, &status).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::load(&config_path)?;

    let interval = Duration::from_secs(config.airgradient.poll_rate);
    info!(
        url = %config.airgradient.url,
        poll_rate = config.airgradient.poll_rate,
        "polling airgradient status"
    );

    let mut bridge = Bridge::new(config)?;

    loop {
        bridge.poll_once().await;
        debug!(secs = interval.as_secs(), "sleeping until next poll");
        sleep(interval).await;
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_unix_is_recent() {
        let ts = now_unix();
        // After 2024-01-01 and before 2040-01-01.
        assert!(ts > 1_704_067_200, "timestamp too old: {ts}");
        assert!(ts < 2_208_988_800, "timestamp too far in future: {ts}");
    }

    #[test]
    fn one_cycle_produces_the_expected_message_set() {
        let table = FieldTable::resolve().unwrap();
        let mut status = AirGradientStatus {
            serialno: "ABC123".to_string(),
            model: "I-9PSL".to_string(),
            firmware: "3.1.1".to_string(),
            rco2: 662,
            pm02_compensated: 8,
            ..Default::default()
        };
        status.derive_aqi();

        let hass_cfg = HassConfig {
            discovery: true,
            discovery_prefix: "homeassistant".to_string(),
            device_name: "airgradient".to_string(),
            device_model: "AirGradient ONE".to_string(),
            manufacturer: "AirGradient".to_string(),
        };

        // One point for influx, one flat message per mqtt field, three
        // discovery messages per hass field - all in field table order.
        let point = influx::point_fields(&table, &status);
        let flat = mqtt::flat_messages(&table, &status, "airgradient", "airgradient-ABC123");
        let discovery = hass::discovery_messages(&hass_cfg, &table, &status);

        assert_eq!(point.len(), 20);
        assert_eq!(flat.len(), 15);
        assert_eq!(discovery.len(), 45);

        let flat_names: Vec<&str> = flat
            .iter()
            .map(|(t, _)| t.rsplit('/').next().unwrap())
            .collect();
        let discovery_names: Vec<&str> = discovery
            .iter()
            .step_by(3)
            .map(|(t, _)| t.rsplit('/').nth(1).unwrap())
            .collect();
        assert_eq!(flat_names, discovery_names);
        assert_eq!(flat_names.first(), Some(&"rco2"));
        assert_eq!(flat_names.last(), Some(&"aqi"));
    }

    #[tokio::test]
    async fn empty_serial_skips_the_cycle_and_keeps_the_topic_unset() {
        // An unpolled event loop still accepts publishes into its request
        // channel, so dispatch can run against a real client.
        let options = rumqttc::MqttOptions::new("test", "127.0.0.1", 1883);
        let (client, _eventloop) = AsyncClient::new(options, 64);

        let mut bridge = Bridge {
            poller: Poller::new("http://127.0.0.1:1/measures/current").unwrap(),
            table: FieldTable::resolve().unwrap(),
            influx: None,
            mqtt: Some(MqttSink {
                client,
                prefix: "airgradient".to_string(),
                topic: None,
            }),
            hass: None,
        };

        bridge.dispatch(AirGradientStatus::default()).await;
        assert_eq!(bridge.mqtt.as_ref().unwrap().topic, None);

        let mut status = AirGradientStatus {
            serialno: "ABC123".to_string(),
            ..Default::default()
        };
        status.derive_aqi();
        bridge.dispatch(status).await;
        assert_eq!(
            bridge.mqtt.as_ref().unwrap().topic.as_deref(),
            Some("airgradient-ABC123")
        );
    }
}
