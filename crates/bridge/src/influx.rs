//! InfluxDB sink: one tagged, multi-field point per poll.

use influxdb::{Client, InfluxDbWriteable, Timestamp, Type};
use tracing::{error, info};

use crate::config::InfluxConfig;
use crate::status::{AirGradientStatus, FieldTable, FieldValue};

pub struct InfluxSink {
    client: Client,
    measurement: String,
}

impl InfluxSink {
    pub fn new(cfg: &InfluxConfig) -> Self {
        let url = format!("http://{}:{}", cfg.hostname, cfg.port);
        let mut client = Client::new(url, cfg.database.as_str());
        if !cfg.username.is_empty() && !cfg.password.is_empty() {
            client = client.with_auth(cfg.username.as_str(), cfg.password.as_str());
        }
        Self { client, measurement: cfg.measurement.clone() }
    }

    /// Write the poll's point: identifying tags plus every non-suppressed
    /// field under its resolved name, native types preserved. A failed
    /// write is logged and dropped; the next poll gets a fresh point.
    pub async fn write(
        &self,
        table: &FieldTable,
        status: &AirGradientStatus,
        timestamp_secs: u64,
    ) {
        let mut query = Timestamp::Seconds(u128::from(timestamp_secs))
            .into_query(self.measurement.as_str())
            .add_tag("mac", status.serialno.clone())
            .add_tag("model", status.model.clone());

        for (name, value) in point_fields(table, status) {
            query = query.add_field(name, value);
        }

        match self.client.query(query).await {
            Ok(_) => info!(measurement = %self.measurement, "point written to influxdb"),
            Err(e) => error!("influxdb write failed: {e}"),
        }
    }
}

/// Assemble the typed field set for one poll, in field table order.
pub fn point_fields(table: &FieldTable, status: &AirGradientStatus) -> Vec<(String, Type)> {
    let mut fields = Vec::new();
    for field in table.iter() {
        let Some(name) = field.influx.publish_name() else {
            continue;
        };
        let Some(value) = field.value(status) else {
            continue;
        };
        fields.push((name.to_string(), to_type(value)));
    }
    fields
}

fn to_type(value: FieldValue) -> Type {
    match value {
        FieldValue::Int(v) => Type::SignedInteger(v),
        FieldValue::Float(v) => Type::Float(v),
        FieldValue::Text(v) => Type::Text(v),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
