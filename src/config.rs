//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause between fetching data and resolving pending location sets.
    #[serde(
        rename = "settle_delay_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub settle_delay: Duration,
    /// Character that packs several values into one attribute.
    pub list_separator: char,
    /// Preset ids that let an undistinguished building try `building/yes` matches.
    pub generic_building_presets: Vec<String>,
    /// Keys whose values always survive an upgrade.
    pub always_preserve: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            list_separator: ';',
            generic_building_presets: [
                "building/commercial",
                "building/government",
                "building/hotel",
                "building/retail",
                "building/office",
                "building/supermarket",
                "building/yes",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            always_preserve: vec!["building".to_string(), "takeaway".to_string()],
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns the `serde_json` error when a present field has the wrong type,
    /// e.g. a negative `settle_delay_ms` or a multi-character `list_separator`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Returns true if `preset_id` is one of the generic building presets.
    #[must_use]
    pub fn is_generic_building(&self, preset_id: &str) -> bool {
        self.generic_building_presets.iter().any(|p| p == preset_id)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn deserialize_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}
