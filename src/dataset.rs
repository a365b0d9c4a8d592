//! Canonical dataset types.
//!
//! These mirror the JSON resources the load pipeline fetches: the canonical
//! dataset (categories keyed by `tree/key/value`), the dissolved-item set, the
//! cross-reference replacement table and the tree metadata.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DataShapeError;
use crate::tags::FeatureTags;

/// Names of the JSON resources the load pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Canonical dataset: `tkv -> Category`.
    Dataset,
    /// Dissolved item ids.
    Dissolved,
    /// Cross-reference replacement table.
    Replacements,
    /// Tree metadata.
    Trees,
    /// Presets bundle for the preset classifier.
    Presets,
    /// Feature collection of custom geofences for the location service.
    Features,
}

impl Resource {
    /// Returns the resource name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Dissolved => "dissolved",
            Self::Replacements => "replacements",
            Self::Trees => "trees",
            Self::Presets => "presets",
            Self::Features => "features",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn decode<T: DeserializeOwned>(resource: Resource, value: serde_json::Value) -> Result<T, DataShapeError> {
    serde_json::from_value(value).map_err(|e| DataShapeError::Decode {
        resource,
        message: e.to_string(),
    })
}

/// Region codes (or custom geofence ids) an item is valid in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSet {
    /// Regions the item is valid in. Empty means everywhere.
    pub include: Vec<String>,
    /// Regions carved out of `include`.
    pub exclude: Vec<String>,
}

impl LocationSet {
    /// Returns true if this set places no restriction at all.
    #[must_use]
    pub fn is_worldwide(&self) -> bool {
        self.exclude.is_empty() && (self.include.is_empty() || self.include.iter().any(|r| r == "001"))
    }
}

/// One canonical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique item id.
    pub id: String,
    /// Human-facing label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Canonical attributes applied on upgrade.
    #[serde(default)]
    pub tags: FeatureTags,
    /// Owning category, filled in by the index builder.
    #[serde(default)]
    pub tkv: String,
    /// The tree's cross-reference attribute, filled in by the index builder.
    #[serde(default)]
    pub main_tag: String,
    /// Item-level override of the category's preserve patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_tags: Option<Vec<String>>,
    /// Extra names the matcher treats as alternate spellings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_names: Vec<String>,
    /// Where the item applies; worldwide when omitted.
    #[serde(default)]
    pub location_set: LocationSet,
}

impl Item {
    /// Creates an item with the given id and canonical tags.
    #[must_use]
    pub fn new(id: impl Into<String>, tags: FeatureTags) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            tags,
            tkv: String::new(),
            main_tag: String::new(),
            preserve_tags: None,
            match_names: Vec::new(),
            location_set: LocationSet::default(),
        }
    }

    /// Returns the item's own cross-reference value, if it declares one.
    #[must_use]
    pub fn cross_ref(&self) -> Option<&str> {
        self.tags
            .get(&self.main_tag)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Name patterns a category rejects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Exclusions {
    /// Names too generic to identify any single brand.
    pub generic: Vec<String>,
    /// Names that belong to something else entirely.
    pub named: Vec<String>,
}

/// Category-level properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryProperties {
    /// Default preserve patterns for items of this category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_tags: Option<Vec<String>>,
    /// Name patterns the matcher reports as generic or as another entity.
    pub exclude: Exclusions,
}

/// A `tree/key/value` bucket of items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    /// Settings shared by every item of the category.
    pub properties: CategoryProperties,
    /// Items in dataset order.
    pub items: Vec<Item>,
}

impl Category {
    /// Creates a category holding `items`.
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            properties: CategoryProperties::default(),
            items,
        }
    }
}

/// The canonical dataset: `tkv -> Category`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDataset {
    /// Categories keyed by `tree/key/value`.
    #[serde(rename = "nsi")]
    pub categories: BTreeMap<String, Category>,
}

impl CanonicalDataset {
    /// Decodes the dataset resource.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DataShapeError> {
        decode(Resource::Dataset, value)
    }

    /// Adds (or replaces) a category.
    pub fn insert(&mut self, tkv: impl Into<String>, category: Category) {
        self.categories.insert(tkv.into(), category);
    }

    /// Looks up a category by `tkv`.
    #[must_use]
    pub fn get(&self, tkv: &str) -> Option<&Category> {
        self.categories.get(tkv)
    }

    /// Total number of items across all categories.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.categories.values().map(|c| c.items.len()).sum()
    }
}

/// Item ids that must never be suggested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DissolvedSet {
    ids: HashSet<String>,
}

#[derive(Deserialize)]
struct DissolvedDoc {
    #[serde(default)]
    dissolved: HashMap<String, serde_json::Value>,
}

impl DissolvedSet {
    /// Decodes the dissolved resource; only the key set is kept.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DataShapeError> {
        let doc: DissolvedDoc = decode(Resource::Dissolved, value)?;
        Ok(doc.dissolved.into_keys().collect())
    }

    /// Returns true if `item_id` is dissolved.
    #[must_use]
    pub fn contains(&self, item_id: &str) -> bool {
        self.ids.contains(item_id)
    }

    /// Number of dissolved items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no item is dissolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<String> for DissolvedSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// What to do with one cross-reference attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CrossRefEdit {
    /// Replace the value.
    Set(String),
    /// Remove the attribute.
    Delete,
}

fn deserialize_edit<'de, D>(deserializer: D) -> Result<Option<CrossRefEdit>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => Ok(Some(CrossRefEdit::Delete)),
        serde_json::Value::String(s) if s.is_empty() => Ok(Some(CrossRefEdit::Delete)),
        serde_json::Value::String(s) => Ok(Some(CrossRefEdit::Set(s))),
        other => Err(D::Error::custom(format!(
            "expected a string or a delete marker, found {other}"
        ))),
    }
}

/// Replacement for one stale cross-reference value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Replacement {
    /// Edit for the `*wikidata` attribute. `None` leaves it alone.
    #[serde(default, deserialize_with = "deserialize_edit")]
    pub wikidata: Option<CrossRefEdit>,
    /// Edit for the mirrored `*wikipedia` attribute.
    #[serde(default, deserialize_with = "deserialize_edit")]
    pub wikipedia: Option<CrossRefEdit>,
}

/// Old cross-reference value -> replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplacementTable {
    #[serde(rename = "wikidata", default)]
    entries: HashMap<String, Replacement>,
}

impl ReplacementTable {
    /// Decodes the replacements resource.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DataShapeError> {
        decode(Resource::Replacements, value)
    }

    /// Adds (or replaces) an entry.
    pub fn insert(&mut self, old: impl Into<String>, replacement: Replacement) {
        self.entries.insert(old.into(), replacement);
    }

    /// Replacement registered for the stale value `old`.
    #[must_use]
    pub fn get(&self, old: &str) -> Option<&Replacement> {
        self.entries.get(old)
    }

    /// Number of stale values with a replacement.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A grouping of items sharing a `mainTag` convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    /// Tree id, filled from the map key when decoded.
    #[serde(default)]
    pub id: String,
    /// Attribute carrying an item's cross-reference identifier.
    pub main_tag: String,
}

impl Tree {
    /// Tree `id` whose items carry their cross-reference in `main_tag`.
    #[must_use]
    pub fn new(id: impl Into<String>, main_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            main_tag: main_tag.into(),
        }
    }
}

/// Tree metadata keyed by tree id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Trees {
    #[serde(default)]
    trees: BTreeMap<String, Tree>,
}

impl Trees {
    /// Decodes the trees resource.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DataShapeError> {
        let mut decoded: Self = decode(Resource::Trees, value)?;
        for (id, tree) in &mut decoded.trees {
            tree.id.clone_from(id);
        }
        Ok(decoded)
    }

    /// Metadata for tree `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Tree> {
        self.trees.get(id)
    }

    /// Number of trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Returns true if no tree is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl FromIterator<Tree> for Trees {
    fn from_iter<I: IntoIterator<Item = Tree>>(iter: I) -> Self {
        Self {
            trees: iter.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_decodes_items_and_properties() {
        let dataset = CanonicalDataset::from_json(json!({
            "nsi": {
                "brands/shop/convenience": {
                    "properties": { "preserveTags": ["^name"], "exclude": { "generic": ["^shop$"] } },
                    "items": [{
                        "id": "acme-1",
                        "displayName": "Acme",
                        "tags": { "brand": "Acme", "brand:wikidata": "Q1", "shop": "convenience" },
                        "locationSet": { "include": ["us"] },
                        "matchNames": ["acme express"]
                    }]
                }
            }
        }))
        .unwrap();

        let category = dataset.get("brands/shop/convenience").unwrap();
        assert_eq!(category.properties.preserve_tags.as_deref(), Some(&["^name".to_string()][..]));
        assert_eq!(category.properties.exclude.generic, vec!["^shop$".to_string()]);
        let item = &category.items[0];
        assert_eq!(item.display_name.as_deref(), Some("Acme"));
        assert_eq!(item.location_set.include, vec!["us".to_string()]);
        assert_eq!(item.match_names, vec!["acme express".to_string()]);
        assert!(item.tkv.is_empty());
        assert_eq!(dataset.item_count(), 1);
    }

    #[test]
    fn test_dataset_decode_error_names_resource() {
        let err = CanonicalDataset::from_json(json!({ "nsi": { "a/b/c": { "items": 3 } } })).unwrap_err();
        assert!(matches!(err, DataShapeError::Decode { resource: Resource::Dataset, .. }));
    }

    #[test]
    fn test_replacement_delete_markers() {
        let table = ReplacementTable::from_json(json!({
            "wikidata": {
                "Q1": { "wikidata": "Q2", "wikipedia": "en:Acme" },
                "Q3": { "wikidata": null },
                "Q4": { "wikipedia": "" },
                "Q5": { "wikidata": false }
            }
        }))
        .unwrap();

        let q1 = table.get("Q1").unwrap();
        assert_eq!(q1.wikidata, Some(CrossRefEdit::Set("Q2".to_string())));
        assert_eq!(q1.wikipedia, Some(CrossRefEdit::Set("en:Acme".to_string())));

        let q3 = table.get("Q3").unwrap();
        assert_eq!(q3.wikidata, Some(CrossRefEdit::Delete));
        assert_eq!(q3.wikipedia, None);

        assert_eq!(table.get("Q4").unwrap().wikipedia, Some(CrossRefEdit::Delete));
        assert_eq!(table.get("Q5").unwrap().wikidata, Some(CrossRefEdit::Delete));
        assert!(table.get("Q6").is_none());
    }

    #[test]
    fn test_replacement_rejects_numbers() {
        let err = ReplacementTable::from_json(json!({ "wikidata": { "Q1": { "wikidata": 7 } } }));
        assert!(err.is_err());
    }

    #[test]
    fn test_trees_take_id_from_key() {
        let trees = Trees::from_json(json!({
            "trees": {
                "brands": { "mainTag": "brand:wikidata", "emoji": "🍔" },
                "operators": { "mainTag": "operator:wikidata" }
            }
        }))
        .unwrap();
        assert_eq!(trees.len(), 2);
        let brands = trees.get("brands").unwrap();
        assert_eq!(brands.id, "brands");
        assert_eq!(brands.main_tag, "brand:wikidata");
    }

    #[test]
    fn test_dissolved_keeps_keys() {
        let dissolved = DissolvedSet::from_json(json!({
            "dissolved": { "gone-1": [{ "date": "2020-01-01" }], "gone-2": [] }
        }))
        .unwrap();
        assert_eq!(dissolved.len(), 2);
        assert!(dissolved.contains("gone-1"));
        assert!(!dissolved.contains("acme-1"));
    }

    #[test]
    fn test_location_set_worldwide() {
        assert!(LocationSet::default().is_worldwide());
        let world = LocationSet {
            include: vec!["001".to_string()],
            exclude: vec![],
        };
        assert!(world.is_worldwide());
        let us = LocationSet {
            include: vec!["us".to_string()],
            exclude: vec![],
        };
        assert!(!us.is_worldwide());
    }
}
