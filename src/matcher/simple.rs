//! Exact-name reference matcher.
//!
//! Names are compared after normalization (compatibility-decomposed, accents,
//! punctuation and whitespace dropped, lowercased) and only within the queried `key/value` bucket. An item's
//! own name-like tags produce `primary` hits and its `matchNames` produce
//! `alternate` hits. A category's `exclude` patterns short-circuit to a single
//! informational hit.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::dataset::{CanonicalDataset, Item, LocationSet};
use crate::index::{compile_key_pattern, split_tkv};
use crate::location::LocationService;
use crate::tags::Location;

use super::{MatchContract, MatchHit, MatchKind};

const NAME_KEYS: &[&str] = &["name", "brand", "operator", "network", "flag:name"];

/// Folds accents, lowercases and strips everything but letters and digits.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c) && c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_indexed_name_key(key: &str) -> bool {
    if key.ends_with("wikidata") {
        return true;
    }
    if key.contains(":wiki") {
        return false;
    }
    NAME_KEYS.contains(&key) || key.starts_with("name:")
}

const fn kind_rank(kind: MatchKind) -> u8 {
    match kind {
        MatchKind::Primary => 0,
        MatchKind::Alternate => 1,
        MatchKind::ExcludeGeneric => 2,
        MatchKind::ExcludeNamed => 3,
    }
}

#[derive(Debug, Clone)]
struct Entry {
    item_id: String,
    kind: MatchKind,
}

/// Exact-name matcher scoped by `key/value`.
#[derive(Default)]
pub struct SimpleMatcher {
    /// "key/value" -> normalized name -> ranked entries
    names: HashMap<String, HashMap<String, Vec<Entry>>>,
    exclusions: HashMap<String, Vec<(Regex, MatchKind)>>,
    location_sets: HashMap<String, LocationSet>,
    locations: Option<Arc<dyn LocationService>>,
}

impl fmt::Debug for SimpleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleMatcher")
            .field("buckets", &self.names.len())
            .field("location_sets", &self.location_sets.len())
            .finish_non_exhaustive()
    }
}

impl SimpleMatcher {
    /// A matcher with no names indexed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add_name(&mut self, kv: &str, name: &str, item_id: &str, kind: MatchKind) {
        let normalized = normalize(name);
        if normalized.is_empty() {
            return;
        }
        let entries = self
            .names
            .entry(kv.to_string())
            .or_default()
            .entry(normalized)
            .or_default();
        if !entries.iter().any(|e| e.item_id == item_id) {
            entries.push(Entry {
                item_id: item_id.to_string(),
                kind,
            });
        }
    }

    fn add_exclusions(&mut self, kv: &str, patterns: &[String], kind: MatchKind) {
        for pattern in patterns {
            match compile_key_pattern(pattern) {
                Ok(re) => self.exclusions.entry(kv.to_string()).or_default().push((re, kind)),
                Err(e) => warn!(%kv, %pattern, error = %e, "skipping invalid exclude pattern"),
            }
        }
    }

    fn index_item(&mut self, kv: &str, item: &Item) {
        for (key, value) in &item.tags {
            if is_indexed_name_key(key) {
                self.add_name(kv, value, &item.id, MatchKind::Primary);
            }
        }
        for name in &item.match_names {
            self.add_name(kv, name, &item.id, MatchKind::Alternate);
        }
    }

    fn in_location(&self, item_id: &str, location: Option<Location>) -> bool {
        match (location, &self.locations) {
            (Some(location), Some(service)) => self
                .location_sets
                .get(item_id)
                .map_or(true, |set| service.contains(set, location)),
            _ => true,
        }
    }
}

impl MatchContract for SimpleMatcher {
    fn build_match_index(&mut self, dataset: &CanonicalDataset) {
        for (tkv, category) in &dataset.categories {
            let Ok((_, key, value)) = split_tkv(tkv) else {
                warn!(%tkv, "skipping malformed category key");
                continue;
            };
            let kv = format!("{key}/{value}");

            self.add_exclusions(&kv, &category.properties.exclude.generic, MatchKind::ExcludeGeneric);
            self.add_exclusions(&kv, &category.properties.exclude.named, MatchKind::ExcludeNamed);
            for item in &category.items {
                self.index_item(&kv, item);
            }
        }

        for bucket in self.names.values_mut() {
            for entries in bucket.values_mut() {
                entries.sort_by_key(|e| kind_rank(e.kind));
            }
        }
        debug!(buckets = self.names.len(), "built match index");
    }

    fn build_location_index(&mut self, dataset: &CanonicalDataset, locations: Arc<dyn LocationService>) {
        self.location_sets = dataset
            .categories
            .values()
            .flat_map(|c| &c.items)
            .filter(|item| !item.location_set.is_worldwide())
            .map(|item| (item.id.clone(), item.location_set.clone()))
            .collect();
        self.locations = Some(locations);
        debug!(restricted = self.location_sets.len(), "built location index");
    }

    fn find_matches(&self, key: &str, value: &str, name: &str, location: Option<Location>) -> Vec<MatchHit> {
        let kv = format!("{key}/{value}");

        if let Some(patterns) = self.exclusions.get(&kv) {
            let trimmed = name.trim();
            if let Some((_, kind)) = patterns.iter().find(|(re, _)| re.is_match(trimmed)) {
                return vec![MatchHit::informational(*kind)];
            }
        }

        let Some(entries) = self.names.get(&kv).and_then(|bucket| bucket.get(&normalize(name))) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| self.in_location(&e.item_id, location))
            .map(|e| MatchHit::item(e.item_id.clone(), e.kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Category;
    use crate::location::CountryLocationService;
    use crate::tags::feature_tags;

    fn dataset() -> CanonicalDataset {
        let mut acme = Item::new(
            "acme-1",
            feature_tags([("brand", "Acme"), ("brand:wikidata", "Q1"), ("name", "Acme"), ("shop", "convenience")]),
        );
        acme.match_names = vec!["acme express".to_string()];

        let mut acme_us = Item::new(
            "acme-us",
            feature_tags([("brand", "Acme Express"), ("brand:wikidata", "Q2"), ("name", "Acme Express")]),
        );
        acme_us.location_set.include = vec!["us".to_string()];

        let mut category = Category::new(vec![acme, acme_us]);
        category.properties.exclude.generic = vec!["^(convenience|shop)$".to_string()];

        let mut dataset = CanonicalDataset::default();
        dataset.insert("brands/shop/convenience", category);
        dataset
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Acme-Express! "), "acmeexpress");
        assert_eq!(normalize("Café Ü"), "cafeu");
        assert_eq!(normalize("ＡＣＭＥ"), "acme");
    }

    #[test]
    fn test_primary_hit_on_name() {
        let mut matcher = SimpleMatcher::new();
        matcher.build_match_index(&dataset());
        let hits = matcher.find_matches("shop", "convenience", "ACME", None);
        assert_eq!(hits, vec![MatchHit::item("acme-1", MatchKind::Primary)]);
    }

    #[test]
    fn test_accented_query_hits() {
        let mut matcher = SimpleMatcher::new();
        matcher.build_match_index(&dataset());
        let hits = matcher.find_matches("shop", "convenience", "Ácmé", None);
        assert_eq!(hits, vec![MatchHit::item("acme-1", MatchKind::Primary)]);
    }

    #[test]
    fn test_scoped_by_key_value() {
        let mut matcher = SimpleMatcher::new();
        matcher.build_match_index(&dataset());
        assert!(matcher.find_matches("shop", "bakery", "Acme", None).is_empty());
    }

    #[test]
    fn test_primary_ranked_before_alternate() {
        let mut matcher = SimpleMatcher::new();
        matcher.build_match_index(&dataset());
        let hits = matcher.find_matches("shop", "convenience", "Acme Express", None);
        assert_eq!(
            hits,
            vec![
                MatchHit::item("acme-us", MatchKind::Primary),
                MatchHit::item("acme-1", MatchKind::Alternate),
            ]
        );
    }

    #[test]
    fn test_cross_ref_value_is_indexed() {
        let mut matcher = SimpleMatcher::new();
        matcher.build_match_index(&dataset());
        let hits = matcher.find_matches("shop", "convenience", "Q1", None);
        assert_eq!(hits, vec![MatchHit::item("acme-1", MatchKind::Primary)]);
    }

    #[test]
    fn test_generic_exclusion() {
        let mut matcher = SimpleMatcher::new();
        matcher.build_match_index(&dataset());
        let hits = matcher.find_matches("shop", "convenience", "Convenience", None);
        assert_eq!(hits, vec![MatchHit::informational(MatchKind::ExcludeGeneric)]);
    }

    #[test]
    fn test_location_filter() {
        let dataset = dataset();
        let mut matcher = SimpleMatcher::new();
        matcher.build_match_index(&dataset);
        let service = CountryLocationService::new(|loc| {
            if loc.lon < 0.0 {
                vec!["us".to_string()]
            } else {
                vec!["fr".to_string()]
            }
        });
        matcher.build_location_index(&dataset, Arc::new(service));

        let in_us = matcher.find_matches("shop", "convenience", "Acme Express", Some(Location::new(-90.0, 40.0)));
        assert_eq!(in_us.len(), 2);

        let in_fr = matcher.find_matches("shop", "convenience", "Acme Express", Some(Location::new(2.0, 48.0)));
        assert_eq!(in_fr, vec![MatchHit::item("acme-1", MatchKind::Alternate)]);

        let anywhere = matcher.find_matches("shop", "convenience", "Acme Express", None);
        assert_eq!(anywhere.len(), 2);
    }
}
