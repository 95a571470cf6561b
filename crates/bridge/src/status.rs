//! The AirGradient status document and the field table that drives every
//! publisher.
//!
//! Each field is declared once in [`FIELD_SPECS`] with its accessor and raw
//! per-sink tag strings. [`FieldTable::resolve`] runs the tags through the
//! resolver at startup, so the poll loop iterates a plain, ordered list of
//! already-resolved metadata.

use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::aqi;
use crate::tags::{self, HASS_LABELS, INFLUX_LABELS, MQTT_LABELS};

// ---------------------------------------------------------------------------
// Status document
// ---------------------------------------------------------------------------

/// One poll's worth of readings, decoded field-for-field from the device's
/// JSON status document. Unknown keys are ignored; missing keys default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AirGradientStatus {
    pub wifi: i64,
    pub serialno: String,
    pub rco2: i64,
    pub pm01: i64,
    pub pm02: i64,
    pub pm10: i64,
    pub pm003count: i64,
    pub atmp: f64,
    #[serde(rename = "atmpCompensated")]
    pub atmp_compensated: f64,
    pub rhum: f64,
    #[serde(rename = "rhumCompensated")]
    pub rhum_compensated: f64,
    #[serde(rename = "pm02Compensated")]
    pub pm02_compensated: i64,
    #[serde(rename = "tvocIndex")]
    pub tvoc_index: i64,
    #[serde(rename = "tvocRaw")]
    pub tvoc_raw: i64,
    #[serde(rename = "noxIndex")]
    pub nox_index: i64,
    #[serde(rename = "noxRaw")]
    pub nox_raw: i64,
    pub boot: i64,
    #[serde(rename = "bootCount")]
    pub boot_count: i64,
    #[serde(rename = "ledMode")]
    pub led_mode: String,
    pub firmware: String,
    pub model: String,
    /// Derived, never decoded. `None` when the concentration is outside the
    /// breakpoint table, in which case every sink omits the field.
    #[serde(skip)]
    pub aqi: Option<i64>,
}

impl AirGradientStatus {
    /// Derive the PM2.5 AQI from the compensated PM2.5 reading.
    pub fn derive_aqi(&mut self) {
        self.aqi = match aqi::compute_aqi(self.pm02_compensated as f64) {
            aqi::AQI_NOT_COMPUTABLE => None,
            index => Some(i64::from(index)),
        };
    }
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A single field's value with its native type preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Text rendering used for MQTT payloads and Home Assistant state topics.
/// Floats use the default shortest form: `0.0` renders as `"0"`.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Field specs
// ---------------------------------------------------------------------------

type Accessor = fn(&AirGradientStatus) -> Option<FieldValue>;

struct FieldSpec {
    key: &'static str,
    mqtt: &'static str,
    hass: &'static str,
    influx: &'static str,
    read: Accessor,
}

const FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec { key: "wifi", mqtt: "-", hass: "-", influx: "wifi", read: |s| Some(FieldValue::Int(s.wifi)) },
    FieldSpec { key: "serialno", mqtt: "-", hass: "-", influx: "-", read: |s| Some(FieldValue::Text(s.serialno.clone())) },
    FieldSpec { key: "rco2", mqtt: "rco2", hass: "rco2,ppm", influx: "rco2", read: |s| Some(FieldValue::Int(s.rco2)) },
    FieldSpec { key: "pm01", mqtt: "pm01", hass: "pm01,µg/m³", influx: "pm01", read: |s| Some(FieldValue::Int(s.pm01)) },
    FieldSpec { key: "pm02", mqtt: "pm02", hass: "pm02,µg/m³", influx: "pm02", read: |s| Some(FieldValue::Int(s.pm02)) },
    FieldSpec { key: "pm10", mqtt: "pm10", hass: "pm10,µg/m³", influx: "pm10", read: |s| Some(FieldValue::Int(s.pm10)) },
    FieldSpec { key: "pm003count", mqtt: "pm003count", hass: "pm003count,particles/0.1L", influx: "pm003_count", read: |s| Some(FieldValue::Int(s.pm003count)) },
    FieldSpec { key: "atmp", mqtt: "atmp", hass: "atmp,°C", influx: "atmp", read: |s| Some(FieldValue::Float(s.atmp)) },
    FieldSpec { key: "atmp_compensated", mqtt: "atmpCompensated", hass: "atmpCompensated,°C", influx: "atmp_compensated", read: |s| Some(FieldValue::Float(s.atmp_compensated)) },
    FieldSpec { key: "rhum", mqtt: "rhum", hass: "rhum,%", influx: "rhum", read: |s| Some(FieldValue::Float(s.rhum)) },
    FieldSpec { key: "rhum_compensated", mqtt: "rhumCompensated", hass: "rhumCompensated,%", influx: "rhum_compensated", read: |s| Some(FieldValue::Float(s.rhum_compensated)) },
    FieldSpec { key: "pm02_compensated", mqtt: "pm02Compensated", hass: "pm02Compensated,µg/m³", influx: "pm02_compensated", read: |s| Some(FieldValue::Int(s.pm02_compensated)) },
    FieldSpec { key: "tvoc_index", mqtt: "tvocIndex", hass: "tvocIndex,ppb", influx: "tvoc_index", read: |s| Some(FieldValue::Int(s.tvoc_index)) },
    FieldSpec { key: "tvoc_raw", mqtt: "tvocRaw", hass: "tvocRaw,ppb", influx: "tvoc_raw", read: |s| Some(FieldValue::Int(s.tvoc_raw)) },
    FieldSpec { key: "nox_index", mqtt: "noxIndex", hass: "noxIndex,ppb", influx: "nox_index", read: |s| Some(FieldValue::Int(s.nox_index)) },
    FieldSpec { key: "nox_raw", mqtt: "noxRaw", hass: "noxRaw", influx: "nox_raw", read: |s| Some(FieldValue::Int(s.nox_raw)) },
    FieldSpec { key: "boot", mqtt: "-", hass: "-", influx: "boot", read: |s| Some(FieldValue::Int(s.boot)) },
    FieldSpec { key: "boot_count", mqtt: "-", hass: "-", influx: "boot_count", read: |s| Some(FieldValue::Int(s.boot_count)) },
    FieldSpec { key: "led_mode", mqtt: "-", hass: "-", influx: "led_mode", read: |s| Some(FieldValue::Text(s.led_mode.clone())) },
    FieldSpec { key: "firmware", mqtt: "-", hass: "-", influx: "firmware", read: |s| Some(FieldValue::Text(s.firmware.clone())) },
    FieldSpec { key: "model", mqtt: "-", hass: "-", influx: "-", read: |s| Some(FieldValue::Text(s.model.clone())) },
    FieldSpec { key: "aqi", mqtt: "aqi", hass: "aqi", influx: "aqi", read: |s| s.aqi.map(FieldValue::Int) },
];

// ---------------------------------------------------------------------------
// Resolved per-sink metadata
// ---------------------------------------------------------------------------

/// A field's resolved publishing metadata for one sink.
#[derive(Debug, Clone, Default)]
pub struct SinkMeta {
    name: Option<String>,
    pub unit: Option<String>,
    pub device_class: Option<String>,
    pub icon: Option<String>,
}

impl SinkMeta {
    fn from_attrs(attrs: HashMap<String, String>, fallback: &str) -> Self {
        let name = attrs
            .get("name")
            .cloned()
            .unwrap_or_else(|| fallback.to_string());
        let take = |label: &str| attrs.get(label).filter(|v| *v != tags::SUPPRESS).cloned();
        Self {
            name: (name != tags::SUPPRESS).then_some(name),
            unit: take("unit"),
            device_class: take("class"),
            icon: take("icon"),
        }
    }

    /// The name the field publishes under, or `None` if suppressed for
    /// this sink.
    pub fn publish_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// One entry of the resolved table: identifier, accessor, per-sink metadata.
pub struct Field {
    pub key: &'static str,
    read: Accessor,
    pub mqtt: SinkMeta,
    pub influx: SinkMeta,
    pub hass: SinkMeta,
}

impl Field {
    pub fn value(&self, status: &AirGradientStatus) -> Option<FieldValue> {
        (self.read)(status)
    }
}

// ---------------------------------------------------------------------------
// Field table
// ---------------------------------------------------------------------------

/// The ordered field table every publisher iterates. Iteration order is the
/// declaration order above, stable poll-to-poll.
pub struct FieldTable {
    fields: Vec<Field>,
}

impl FieldTable {
    /// Resolve every field spec against each sink's label order. Collects
    /// all violations so a bad table fails startup with the full list.
    pub fn resolve() -> Result<Self> {
        let mut fields = Vec::with_capacity(FIELD_SPECS.len());
        let mut errors: Vec<String> = Vec::new();

        for spec in FIELD_SPECS {
            let mut resolve_sink = |sink: &str, tag: &str, labels: &[&str]| -> SinkMeta {
                match tags::resolve_tags(tag, labels) {
                    Ok(attrs) => SinkMeta::from_attrs(attrs, spec.key),
                    Err(e) => {
                        errors.push(format!("field '{}' ({sink} tag): {e}", spec.key));
                        SinkMeta::default()
                    }
                }
            };

            let mqtt = resolve_sink("mqtt", spec.mqtt, MQTT_LABELS);
            let influx = resolve_sink("influx", spec.influx, INFLUX_LABELS);
            let hass = resolve_sink("hass", spec.hass, HASS_LABELS);

            fields.push(Field { key: spec.key, read: spec.read, mqtt, influx, hass });
        }

        if !errors.is_empty() {
            bail!(
                "field metadata resolution failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }

        Ok(Self { fields })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
