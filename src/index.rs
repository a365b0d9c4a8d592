//! Reverse indices over the canonical dataset.
//!
//! `Indices` is built once after the dataset loads and is read-only from then on.
//! `Indices::default()` is the empty-but-well-typed structure used before loading
//! completes (or after it fails); every lookup against it simply misses.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::dataset::{CanonicalDataset, CategoryProperties, DissolvedSet, Item, Replacement, ReplacementTable, Trees};
use crate::error::DataShapeError;

/// Compiles a preserve pattern, case-insensitively, for testing against whole keys.
pub(crate) fn compile_key_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Returns the `*wikipedia` attribute mirroring a `*wikidata` attribute.
#[must_use]
pub fn mirrored_wikipedia_key(wikidata_key: &str) -> String {
    wikidata_key.replace("wikidata", "wikipedia")
}

/// Splits a `tree/key/value` category key into its three parts.
pub fn split_tkv(tkv: &str) -> Result<(&str, &str, &str), DataShapeError> {
    let mut parts = tkv.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(k), Some(v), None) if !t.is_empty() && !k.is_empty() && !v.is_empty() => Ok((t, k, v)),
        _ => Err(DataShapeError::MalformedTkv {
            tkv: tkv.to_string(),
        }),
    }
}

/// Fast-lookup indices derived from the canonical dataset.
#[derive(Debug, Clone, Default)]
pub struct Indices {
    /// key -> (value -> tree id)
    key_value_tree: HashMap<String, HashMap<String, String>>,
    /// cross-reference value (wikidata or wikipedia form) -> canonical wikidata value
    cross_ref_to_canonical: HashMap<String, String>,
    item_by_id: HashMap<String, Item>,
    category_properties: HashMap<String, CategoryProperties>,
    dissolved: DissolvedSet,
    replacements: ReplacementTable,
}

impl Indices {
    /// Builds all indices from a loaded dataset.
    ///
    /// # Errors
    /// - `MalformedTkv`: a category key does not split into exactly three parts
    /// - `UnknownTree`: a category key names a tree missing from `trees`
    /// - `InvalidPreservePattern`: an item or category preserve pattern does not compile
    pub fn build(
        dataset: &CanonicalDataset,
        dissolved: DissolvedSet,
        replacements: ReplacementTable,
        trees: &Trees,
    ) -> Result<Self, DataShapeError> {
        let mut indices = Self {
            dissolved,
            replacements,
            ..Self::default()
        };

        for (tkv, category) in &dataset.categories {
            let (tree_id, key, value) = split_tkv(tkv)?;
            let tree = trees.get(tree_id).ok_or_else(|| DataShapeError::UnknownTree {
                tkv: tkv.clone(),
                tree: tree_id.to_string(),
            })?;

            indices
                .key_value_tree
                .entry(key.to_string())
                .or_default()
                .insert(value.to_string(), tree_id.to_string());

            validate_patterns(category.properties.preserve_tags.as_deref())?;
            indices
                .category_properties
                .insert(tkv.clone(), category.properties.clone());

            let main_tag = tree.main_tag.as_str();
            let wikipedia_tag = mirrored_wikipedia_key(main_tag);

            for item in &category.items {
                validate_patterns(item.preserve_tags.as_deref())?;

                let mut item = item.clone();
                item.tkv.clone_from(tkv);
                item.main_tag = main_tag.to_string();

                if let Some(wikidata) = item.tags.get(main_tag).filter(|v| !v.is_empty()) {
                    indices
                        .cross_ref_to_canonical
                        .insert(wikidata.clone(), wikidata.clone());
                    if let Some(wikipedia) = item.tags.get(&wikipedia_tag).filter(|v| !v.is_empty()) {
                        indices
                            .cross_ref_to_canonical
                            .insert(wikipedia.clone(), wikidata.clone());
                    }
                }

                indices.item_by_id.insert(item.id.clone(), item);
            }
        }

        debug!(
            keys = indices.key_value_tree.len(),
            items = indices.item_by_id.len(),
            cross_refs = indices.cross_ref_to_canonical.len(),
            "built canonical indices"
        );
        Ok(indices)
    }

    /// Returns true if no dataset has been indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_value_tree.is_empty() && self.item_by_id.is_empty()
    }

    /// The raw `key -> (value -> tree)` map.
    #[must_use]
    pub fn key_value_tree(&self) -> &HashMap<String, HashMap<String, String>> {
        &self.key_value_tree
    }

    /// Values known for `key`, if the key is a primary classification key anywhere in the dataset.
    #[must_use]
    pub fn values_for(&self, key: &str) -> Option<&HashMap<String, String>> {
        self.key_value_tree.get(key)
    }

    /// Tree id that owns `key=value`.
    #[must_use]
    pub fn tree_for(&self, key: &str, value: &str) -> Option<&str> {
        self.key_value_tree
            .get(key)
            .and_then(|values| values.get(value))
            .map(String::as_str)
    }

    /// Every primary classification key in the dataset.
    pub fn known_keys(&self) -> impl Iterator<Item = &str> {
        self.key_value_tree.keys().map(String::as_str)
    }

    /// Resolves a wikidata or wikipedia value to its canonical wikidata value.
    #[must_use]
    pub fn canonical_cross_ref(&self, value: &str) -> Option<&str> {
        self.cross_ref_to_canonical.get(value).map(String::as_str)
    }

    /// The raw cross-reference map.
    #[must_use]
    pub fn cross_ref_to_canonical(&self) -> &HashMap<String, String> {
        &self.cross_ref_to_canonical
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.item_by_id.get(id)
    }

    /// Every item, in no particular order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.item_by_id.values()
    }

    /// Number of indexed items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.item_by_id.len()
    }

    /// Properties of the category `tkv`.
    #[must_use]
    pub fn category_properties(&self, tkv: &str) -> Option<&CategoryProperties> {
        self.category_properties.get(tkv)
    }

    /// Number of indexed categories.
    #[must_use]
    pub fn category_count(&self) -> usize {
        self.category_properties.len()
    }

    /// Returns true if `item_id` must never be suggested.
    #[must_use]
    pub fn is_dissolved(&self, item_id: &str) -> bool {
        self.dissolved.contains(item_id)
    }

    /// Replacement for a stale cross-reference value.
    #[must_use]
    pub fn replacement(&self, old: &str) -> Option<&Replacement> {
        self.replacements.get(old)
    }
}

fn validate_patterns(patterns: Option<&[String]>) -> Result<(), DataShapeError> {
    for pattern in patterns.unwrap_or_default() {
        compile_key_pattern(pattern).map_err(|e| DataShapeError::InvalidPreservePattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
