//! Home Assistant MQTT discovery publisher.
//!
//! Per field, three messages in a fixed order: availability, state, then
//! the discovery-config JSON that tells Home Assistant how to present the
//! sensor. Topic strings are a compatibility surface for the discovery
//! convention and must match what the config payload references.

use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::HassConfig;
use crate::status::{AirGradientStatus, FieldTable};

// ---------------------------------------------------------------------------
// Discovery document
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoveryDevice {
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub availability_topic: String,
    pub device: DiscoveryDevice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub name: String,
    pub qos: i32,
    pub state_topic: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
}

// ---------------------------------------------------------------------------
// Message building
// ---------------------------------------------------------------------------

/// Build the availability/state/config triples for one cycle, in field
/// table order. The device identifier is the unit's serial number and its
/// software version the reported firmware (omitted when empty).
pub fn discovery_messages(
    cfg: &HassConfig,
    table: &FieldTable,
    status: &AirGradientStatus,
) -> Vec<(String, String)> {
    let mut messages = Vec::new();

    for field in table.iter() {
        let Some(name) = field.hass.publish_name() else {
            continue;
        };
        let Some(value) = field.value(status) else {
            continue;
        };

        let base = format!(
            "{}/sensor/{}/{}",
            cfg.discovery_prefix, cfg.device_name, name
        );

        let payload = DiscoveryPayload {
            availability_topic: format!("{base}/availability"),
            device: DiscoveryDevice {
                identifiers: vec![status.serialno.clone()],
                manufacturer: cfg.manufacturer.clone(),
                model: cfg.device_model.clone(),
                name: cfg.device_name.clone(),
                sw_version: (!status.firmware.is_empty()).then(|| status.firmware.clone()),
            },
            device_class: field.hass.device_class.clone(),
            name: field.key.to_string(),
            qos: 0,
            state_topic: format!("{base}/state"),
            unique_id: format!("{}_{}", status.serialno, name),
            icon: field.hass.icon.clone(),
            unit_of_measurement: field.hass.unit.clone(),
        };

        let config_json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(e) => {
                error!(field = field.key, "failed to encode discovery config: {e}");
                continue;
            }
        };

        messages.push((format!("{base}/availability"), "online".to_string()));
        messages.push((format!("{base}/state"), value.to_string()));
        messages.push((format!("{base}/config"), config_json));
    }

    messages
}

/// Publish the discovery triples through the shared MQTT client. A failed
/// publish is logged; the remaining messages still go out.
pub async fn publish_discovery(
    client: &AsyncClient,
    cfg: &HassConfig,
    table: &FieldTable,
    status: &AirGradientStatus,
) {
    for (topic, payload) in discovery_messages(cfg, table, status) {
        debug!(%topic, "hass publish");
        if let Err(e) = client
            .publish(topic.as_str(), QoS::AtMostOnce, false, payload)
            .await
        {
            error!(%topic, "mqtt publish failed: {e}");
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
