//! Field tag resolution: turns a per-field metadata string like
//! `"pm01,µg/m³"` or `"name:pm01,unit:µg/m³"` into a label→value mapping.
//!
//! Each sink declares an ordered list of labels; bare attributes are
//! assigned positionally against that list, `label:value` attributes are
//! recorded under their own label. The whole field table is resolved once
//! at startup, so a malformed tag is a configuration error, not something
//! to log every poll.

use std::collections::HashMap;

use anyhow::{bail, Result};

/// Label order for flat MQTT publishing.
pub const MQTT_LABELS: &[&str] = &["name"];

/// Label order for InfluxDB field naming.
pub const INFLUX_LABELS: &[&str] = &["name"];

/// Label order for Home Assistant discovery attributes.
pub const HASS_LABELS: &[&str] = &["name", "unit", "class", "icon"];

/// Attribute value meaning "not set" (or, for `name`, "do not publish").
pub const SUPPRESS: &str = "-";

/// Resolve a comma-separated attribute list against a sink's label order.
///
/// Rules:
/// - a bare token is positional: token N maps to `labels[N]`;
/// - a `label:value` token is recorded under `label`, overwriting any
///   positional assignment to the same label;
/// - once a labeled token appears, no further bare tokens are allowed;
/// - a token with more than two `:`-separated parts is invalid.
///
/// Any violation rejects the whole tag string.
pub fn resolve_tags(tag: &str, labels: &[&str]) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    if tag.is_empty() {
        return Ok(attrs);
    }

    let mut positional_ok = true;
    for (i, token) in tag.split(',').enumerate() {
        let parts: Vec<&str> = token.split(':').collect();
        match parts.as_slice() {
            [value] => {
                if !positional_ok {
                    bail!("bare attribute '{token}' follows a labeled attribute in '{tag}'");
                }
                let Some(label) = labels.get(i) else {
                    bail!(
                        "too many bare attributes at '{token}' in '{tag}' (sink takes {})",
                        labels.len()
                    );
                };
                attrs.insert((*label).to_string(), (*value).to_string());
            }
            [label, value] => {
                positional_ok = false;
                attrs.insert((*label).to_string(), (*value).to_string());
            }
            _ => bail!("attribute '{token}' in '{tag}' has more than two parts"),
        }
    }

    Ok(attrs)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // -- positional attributes ----------------------------------------------

    #[test]
    fn single_bare_token_is_name() {
        let attrs = resolve_tags("rco2", &["name"]).unwrap();
        assert_eq!(attrs, map(&[("name", "rco2")]));
    }

    #[test]
    fn bare_tokens_fill_labels_in_order() {
        let attrs = resolve_tags("pm01,µg/m³,-", &["name", "unit", "class"]).unwrap();
        assert_eq!(attrs, map(&[("name", "pm01"), ("unit", "µg/m³"), ("class", "-")]));
    }

    #[test]
    fn suppression_marker_resolves_like_any_name() {
        let attrs = resolve_tags("-", &["name"]).unwrap();
        assert_eq!(attrs, map(&[("name", "-")]));
    }

    #[test]
    fn too_many_bare_tokens_is_an_error() {
        let err = resolve_tags("rco2,ppm", &["name"]).unwrap_err();
        assert!(err.to_string().contains("too many bare attributes"));
    }

    // -- labeled attributes --------------------------------------------------

    #[test]
    fn labeled_tokens_recorded_under_their_label() {
        let attrs = resolve_tags("class:pm25,name:x", &["name"]).unwrap();
        assert_eq!(attrs, map(&[("class", "pm25"), ("name", "x")]));
    }

    #[test]
    fn labeled_overwrites_positional_assignment() {
        let attrs = resolve_tags("x,name:y", &["name"]).unwrap();
        assert_eq!(attrs, map(&[("name", "y")]));
    }

    #[test]
    fn mixed_positional_then_labeled_is_fine() {
        let attrs = resolve_tags("aqi,class:aqi", HASS_LABELS).unwrap();
        assert_eq!(attrs, map(&[("name", "aqi"), ("class", "aqi")]));
    }

    #[test]
    fn bare_after_labeled_is_an_error() {
        let err = resolve_tags("x,class:pm25,y", HASS_LABELS).unwrap_err();
        assert!(err.to_string().contains("follows a labeled attribute"));
    }

    // -- malformed tokens ----------------------------------------------------

    #[test]
    fn three_part_token_is_an_error() {
        let err = resolve_tags("icon:mdi:gauge", HASS_LABELS).unwrap_err();
        assert!(err.to_string().contains("more than two parts"));
    }

    // -- absence -------------------------------------------------------------

    #[test]
    fn empty_tag_yields_empty_mapping() {
        assert!(resolve_tags("", &["name"]).unwrap().is_empty());
    }
}
