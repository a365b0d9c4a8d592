//! Preset classification collaborator.
//!
//! The engine only asks one question of the preset classifier: which preset
//! best describes a feature, so that undistinguished buildings can still be
//! tried against generic building-brand matches.

use std::collections::BTreeSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::tags::{FeatureTags, Geometry};

/// The preset a feature was classified as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetMatch {
    /// Preset id, e.g. `building/retail` or `area`.
    pub id: String,
}

impl PresetMatch {
    /// Match for preset `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Classifies a feature's tags and geometry into a preset.
pub trait PresetClassifier: Send + Sync {
    /// Returns the best matching preset for `tags` drawn as `geometry`.
    fn match_tags(&self, tags: &FeatureTags, geometry: Geometry) -> PresetMatch;

    /// Merges a presets bundle fetched during load.
    fn merge(&self, _bundle: &serde_json::Value) -> Result<(), LoadError> {
        Ok(())
    }
}

const BUILDING_PRESETS: &[&str] = &[
    "building/apartments",
    "building/commercial",
    "building/government",
    "building/hotel",
    "building/house",
    "building/industrial",
    "building/office",
    "building/retail",
    "building/supermarket",
    "building/yes",
];

/// Keys whose presets are more specific than any building preset.
const CATEGORY_KEYS: &[&str] = &["amenity", "craft", "healthcare", "leisure", "office", "shop", "tourism"];

/// Reference classifier that knows only building presets.
///
/// An area feature carrying a category key (`shop`, `amenity`, or any key of a
/// merged non-building preset) classifies as `<key>/<value>`. Otherwise, area
/// features with a `building=*` tag classify as `building/<value>` when that
/// preset is known, or as plain `building`. Anything else falls back to the
/// geometry's own name.
#[derive(Debug)]
pub struct BuildingPresets {
    known: RwLock<BTreeSet<String>>,
    category_keys: RwLock<BTreeSet<String>>,
}

impl Default for BuildingPresets {
    fn default() -> Self {
        Self {
            known: RwLock::new(BUILDING_PRESETS.iter().map(|s| (*s).to_string()).collect()),
            category_keys: RwLock::new(CATEGORY_KEYS.iter().map(|s| (*s).to_string()).collect()),
        }
    }
}

impl BuildingPresets {
    /// Classifier seeded with the common building presets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known building presets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.read().map(|k| k.len()).unwrap_or(0)
    }

    /// Returns true if no building preset is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn category_of(&self, tags: &FeatureTags) -> Option<String> {
        let keys = self.category_keys.read().ok()?;
        tags.iter()
            .find(|(key, value)| !value.is_empty() && keys.contains(key.as_str()))
            .map(|(key, value)| format!("{key}/{value}"))
    }
}

impl PresetClassifier for BuildingPresets {
    fn match_tags(&self, tags: &FeatureTags, geometry: Geometry) -> PresetMatch {
        if geometry == Geometry::Area {
            if let Some(id) = self.category_of(tags) {
                return PresetMatch::new(id);
            }
            if let Some(value) = tags.get("building").filter(|v| !v.is_empty()) {
                let id = format!("building/{value}");
                let known = self.known.read().map(|k| k.contains(&id)).unwrap_or(false);
                return if known {
                    PresetMatch::new(id)
                } else {
                    PresetMatch::new("building")
                };
            }
        }
        PresetMatch::new(geometry.as_str())
    }

    /// Accepts `{ "presets": { "<id>": {...} } }`. Records every `building/*` id,
    /// and the leading key of every other id as a category key.
    fn merge(&self, bundle: &serde_json::Value) -> Result<(), LoadError> {
        let presets = bundle
            .get("presets")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| LoadError::Presets {
                message: "bundle has no 'presets' object".to_string(),
            })?;

        let poisoned = |_| LoadError::Presets {
            message: "poisoned lock: presets".to_string(),
        };
        let (buildings, others): (Vec<&String>, Vec<&String>) =
            presets.keys().partition(|id| id.starts_with("building/"));

        self.known.write().map_err(poisoned)?.extend(buildings.into_iter().cloned());
        self.category_keys.write().map_err(poisoned)?.extend(
            others
                .into_iter()
                .filter_map(|id| id.split_once('/'))
                .map(|(key, _)| key.to_string())
                .filter(|key| key != "building"),
        );
        Ok(())
    }
}
