//! MQTT connection handling and the flat per-field publisher.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::status::{AirGradientStatus, FieldTable};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CHANNEL_CAPACITY: usize = 20;

/// Create the client and spawn a task to drive its event loop for the
/// lifetime of the process. rumqttc reconnects on the next poll after an
/// error, so the task just logs and backs off briefly.
pub fn connect(cfg: &MqttConfig) -> AsyncClient {
    let mut options = MqttOptions::new(
        cfg.client_id.as_str(),
        cfg.broker_host.as_str(),
        cfg.broker_port,
    );
    options.set_keep_alive(KEEP_ALIVE);
    if !cfg.broker_username.is_empty() && !cfg.broker_password.is_empty() {
        options.set_credentials(cfg.broker_username.as_str(), cfg.broker_password.as_str());
    }

    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

    let broker = format!("{}:{}", cfg.broker_host, cfg.broker_port);
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(%broker, "connected to mqtt");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(%broker, "mqtt connection lost: {e}. retrying...");
                    sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    client
}

/// Build the `(topic, payload)` pairs for one flat publish cycle, in field
/// table order. Suppressed and valueless fields are skipped.
pub fn flat_messages(
    table: &FieldTable,
    status: &AirGradientStatus,
    prefix: &str,
    topic: &str,
) -> Vec<(String, String)> {
    let mut messages = Vec::new();
    for field in table.iter() {
        let Some(name) = field.mqtt.publish_name() else {
            continue;
        };
        let Some(value) = field.value(status) else {
            continue;
        };
        messages.push((format!("{prefix}/{topic}/{name}"), value.to_string()));
    }
    messages
}

/// Publish every non-suppressed field as its own QoS 0 message. A failed
/// publish is logged; the remaining fields still go out.
pub async fn publish_flat(
    client: &AsyncClient,
    table: &FieldTable,
    status: &AirGradientStatus,
    prefix: &str,
    topic: &str,
) {
    for (topic, payload) in flat_messages(table, status, prefix, topic) {
        debug!(%topic, %payload, "mqtt publish");
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
