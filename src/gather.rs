//! Candidate gathering.
//!
//! Turns a feature's raw attributes into the prioritized `(key, value, name)`
//! tuples the upgrader tries against the matcher. Every function here is a pure
//! function of the tags and the indices.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::EngineConfig;
use crate::index::Indices;
use crate::presets::PresetClassifier;
use crate::tags::{FeatureTags, Geometry};

/// Value that marks a key as present without saying what it is.
pub const GENERIC_VALUE: &str = "yes";

#[allow(clippy::expect_used)]
fn case_insensitive(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("constant name pattern is valid")
}

/// Key suffixes that look name-like but never hold a name.
static NOT_NAMELIKE: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(r":(colou?r|type|forward|backward|left|right|etymology|pronunciation|wikipedia|wikidata)$")
});

struct KeyPatterns {
    primary: Regex,
    alternate: Regex,
}

static ROUTE_KEYS: LazyLock<KeyPatterns> = LazyLock::new(|| KeyPatterns {
    primary: case_insensitive(r"^network$"),
    alternate: case_insensitive(r"^(network:\w+|operator|operator:\w+|\w+_name|\w+_name:\w+)$"),
});

static FLAGPOLE_KEYS: LazyLock<KeyPatterns> = LazyLock::new(|| KeyPatterns {
    primary: case_insensitive(r"^(flag:name|flag:name:\w+)$"),
    alternate: case_insensitive(r"^(flag|flag:\w+|subject|subject:\w+)$"),
});

static DEFAULT_KEYS: LazyLock<KeyPatterns> = LazyLock::new(|| KeyPatterns {
    primary: case_insensitive(r"^(name|name:\w+)$"),
    alternate: case_insensitive(r"^(brand|brand:\w+|operator|operator:\w+|\w+_name|\w+_name:\w+)$"),
});

/// Which family of keys holds a feature's names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameContext {
    /// Route relations: named by their network.
    Route,
    /// Flagpoles: named by the flag they fly.
    Flagpole,
    /// Everything else.
    Default,
}

impl NameContext {
    /// Resolves the context for a feature.
    #[must_use]
    pub fn of(tags: &FeatureTags) -> Self {
        match (tags.get("type").map(String::as_str), tags.get("man_made").map(String::as_str)) {
            (Some("route" | "route_master"), _) => Self::Route,
            (_, Some("flagpole")) => Self::Flagpole,
            _ => Self::Default,
        }
    }

    fn patterns(self) -> &'static KeyPatterns {
        match self {
            Self::Route => &ROUTE_KEYS,
            Self::Flagpole => &FLAGPOLE_KEYS,
            Self::Default => &DEFAULT_KEYS,
        }
    }

    /// Returns true if `key` holds primary names in this context.
    #[must_use]
    pub fn is_primary_key(self, key: &str) -> bool {
        !NOT_NAMELIKE.is_match(key) && self.patterns().primary.is_match(key)
    }

    /// Returns true if `key` holds alternate names in this context.
    #[must_use]
    pub fn is_alternate_key(self, key: &str) -> bool {
        !NOT_NAMELIKE.is_match(key) && !self.is_primary_key(key) && self.patterns().alternate.is_match(key)
    }
}

/// Primary and alternate candidates, each deduplicated in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates<T> {
    /// Tried first.
    pub primary: Vec<T>,
    /// Tried after every primary candidate.
    pub alternate: Vec<T>,
}

impl<T> Default for Candidates<T> {
    fn default() -> Self {
        Self {
            primary: Vec::new(),
            alternate: Vec::new(),
        }
    }
}

impl<T: PartialEq> Candidates<T> {
    /// Adds to `primary` unless already there.
    pub fn insert_primary(&mut self, candidate: T) {
        if !self.primary.contains(&candidate) {
            self.primary.push(candidate);
        }
    }

    /// Adds to `alternate` unless already there.
    pub fn insert_alternate(&mut self, candidate: T) {
        if !self.alternate.contains(&candidate) {
            self.alternate.push(candidate);
        }
    }

    /// Returns true if neither set holds anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.alternate.is_empty()
    }

    /// Returns true if either set holds `candidate`.
    #[must_use]
    pub fn contains(&self, candidate: &T) -> bool {
        self.primary.contains(candidate) || self.alternate.contains(candidate)
    }

    /// Primary candidates, then alternates.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.primary.iter().chain(&self.alternate)
    }
}

/// A `key=value` pair the dataset has categories for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue {
    /// Classification key, e.g. `shop`.
    pub key: String,
    /// Classification value, e.g. `convenience`.
    pub value: String,
}

impl KeyValue {
    /// The pair `key=value`.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One `(key, value, name)` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    /// Classification key.
    pub key: String,
    /// Classification value.
    pub value: String,
    /// Candidate name.
    pub name: String,
}

/// Key describing the structure a feature occupies rather than the feature itself.
const BUILDING_KEY: &str = "building";

/// The key a tag is looked up under in `keyValueTree`.
fn lookup_key(key: &str) -> &str {
    if key == "route_master" {
        "route"
    } else {
        key
    }
}

/// Collects the `key=value` pairs worth asking the matcher about.
///
/// A listed value lands in `primary`; the generic `yes` lands in `alternate`.
/// `route_master` is looked up as `route`. `building` candidates, including the
/// `building=yes` fallback for areas classified as one of the generic building
/// presets, are only offered for undistinguished buildings: a feature with any
/// other key known to the dataset is matched by that key alone.
pub fn gather_key_values(
    tags: &FeatureTags,
    indices: &Indices,
    presets: &dyn PresetClassifier,
    config: &EngineConfig,
) -> Candidates<KeyValue> {
    let mut found = Candidates::default();
    let present = || tags.iter().filter(|(_, v)| !v.is_empty());
    let distinguished = present()
        .any(|(key, _)| key != BUILDING_KEY && indices.values_for(lookup_key(key)).is_some());

    for (key, value) in present() {
        let key = lookup_key(key);
        if distinguished && key == BUILDING_KEY {
            continue;
        }
        let Some(values) = indices.values_for(key) else {
            continue;
        };
        if value == GENERIC_VALUE {
            found.insert_alternate(KeyValue::new(key, value.as_str()));
        } else if values.contains_key(value) {
            found.insert_primary(KeyValue::new(key, value.as_str()));
        }
    }

    if !distinguished {
        let preset = presets.match_tags(tags, Geometry::Area);
        if config.is_generic_building(&preset.id) {
            found.insert_alternate(KeyValue::new(BUILDING_KEY, GENERIC_VALUE));
        }
    }

    found
}

/// Collects name-like values.
///
/// Keys are classified per [`NameContext`]. A value already collected as a
/// primary name is not repeated as an alternate. If any candidate packs several
/// values with the list separator, nothing is returned at all.
#[must_use]
pub fn gather_names(tags: &FeatureTags, separator: char) -> Candidates<String> {
    let context = NameContext::of(tags);
    let mut found = Candidates::default();
    let mut ambiguous = false;

    let present = || tags.iter().filter(|(_, v)| !v.is_empty());

    for (_, value) in present().filter(|(k, _)| context.is_primary_key(k)) {
        if value.contains(separator) {
            ambiguous = true;
        } else {
            found.insert_primary(value.clone());
        }
    }

    for (_, value) in present().filter(|(k, _)| context.is_alternate_key(k)) {
        if found.primary.contains(value) {
            continue;
        }
        if value.contains(separator) {
            ambiguous = true;
        } else {
            found.insert_alternate(value.clone());
        }
    }

    if context == NameContext::Flagpole && found.is_empty() {
        if let Some(country) = tags.get("country").filter(|v| !v.is_empty()) {
            if country.contains(separator) {
                ambiguous = true;
            } else {
                found.insert_alternate(country.clone());
            }
        }
    }

    if ambiguous {
        return Candidates::default();
    }
    found
}

/// Orders every `(key, value, name)` combination: names outer, pairs inner,
/// primary before alternate on both axes.
#[must_use]
pub fn gather_tuples(key_values: &Candidates<KeyValue>, names: &Candidates<String>) -> Vec<Tuple> {
    names
        .iter()
        .flat_map(move |name| {
            key_values.iter().map(move |kv| Tuple {
                key: kv.key.clone(),
                value: kv.value.clone(),
                name: name.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{CanonicalDataset, Category, DissolvedSet, ReplacementTable, Tree, Trees};
    use crate::presets::BuildingPresets;
    use crate::tags::feature_tags;

    fn indices() -> Indices {
        let trees: Trees = [Tree::new("brands", "brand:wikidata"), Tree::new("transit", "network:wikidata")]
            .into_iter()
            .collect();
        let mut dataset = CanonicalDataset::default();
        for tkv in [
            "brands/shop/convenience",
            "brands/amenity/cafe",
            "brands/building/yes",
            "transit/route/bus",
        ] {
            dataset.insert(tkv, Category::default());
        }
        Indices::build(&dataset, DissolvedSet::default(), ReplacementTable::default(), &trees).unwrap()
    }

    fn kvs(tags: &FeatureTags) -> Candidates<KeyValue> {
        gather_key_values(tags, &indices(), &BuildingPresets::new(), &EngineConfig::default())
    }

    #[test]
    fn test_context_resolution() {
        assert_eq!(NameContext::of(&feature_tags([("type", "route"), ("route", "bus")])), NameContext::Route);
        assert_eq!(NameContext::of(&feature_tags([("type", "route_master")])), NameContext::Route);
        assert_eq!(NameContext::of(&feature_tags([("man_made", "flagpole")])), NameContext::Flagpole);
        assert_eq!(NameContext::of(&feature_tags([("shop", "bakery")])), NameContext::Default);
    }

    #[test]
    fn test_key_values_primary_and_alternate() {
        let found = kvs(&feature_tags([("shop", "convenience"), ("amenity", "yes"), ("craft", "baker")]));
        assert_eq!(found.primary, vec![KeyValue::new("shop", "convenience")]);
        assert_eq!(found.alternate, vec![KeyValue::new("amenity", "yes")]);
    }

    #[test]
    fn test_key_values_ignores_unknown_values_and_empty() {
        let found = kvs(&feature_tags([("shop", "bakery"), ("amenity", "")]));
        assert!(found.is_empty());
    }

    #[test]
    fn test_key_values_building_fallback() {
        let found = kvs(&feature_tags([("building", "retail")]));
        assert!(found.primary.is_empty());
        assert_eq!(found.alternate, vec![KeyValue::new("building", "yes")]);

        let house = kvs(&feature_tags([("building", "house")]));
        assert!(house.is_empty());
    }

    #[test]
    fn test_key_values_building_skipped_for_distinguished_feature() {
        let found = kvs(&feature_tags([("shop", "convenience"), ("building", "yes"), ("name", "Tower Group")]));
        assert_eq!(found.primary, vec![KeyValue::new("shop", "convenience")]);
        assert!(found.alternate.is_empty());

        let unlisted = kvs(&feature_tags([("amenity", "bar"), ("building", "retail")]));
        assert!(unlisted.is_empty());
    }

    #[test]
    fn test_key_values_route_master_as_route() {
        let found = kvs(&feature_tags([("type", "route_master"), ("route_master", "bus")]));
        assert_eq!(found.primary, vec![KeyValue::new("route", "bus")]);
    }

    #[test]
    fn test_names_default_context() {
        let names = gather_names(
            &feature_tags([
                ("name", "Acme"),
                ("name:en", "Acme"),
                ("brand", "Acme Co"),
                ("official_name", "Acme Company"),
                ("name:etymology", "Jane Acme"),
                ("brand:wikidata", "Q1"),
                ("operator", "Acme"),
            ]),
            ';',
        );
        assert_eq!(names.primary, vec!["Acme".to_string()]);
        assert_eq!(names.alternate, vec!["Acme Co".to_string(), "Acme Company".to_string()]);
    }

    #[test]
    fn test_names_route_context() {
        let names = gather_names(
            &feature_tags([
                ("type", "route"),
                ("network", "Metro"),
                ("operator", "City Transit"),
                ("name", "Line 1"),
            ]),
            ';',
        );
        assert_eq!(names.primary, vec!["Metro".to_string()]);
        assert_eq!(names.alternate, vec!["City Transit".to_string()]);
    }

    #[test]
    fn test_names_flagpole_context() {
        let names = gather_names(
            &feature_tags([
                ("man_made", "flagpole"),
                ("flag:name", "Flag of France"),
                ("subject", "France"),
                ("flag:type", "national"),
                ("country", "FR"),
            ]),
            ';',
        );
        assert_eq!(names.primary, vec!["Flag of France".to_string()]);
        assert_eq!(names.alternate, vec!["France".to_string()]);
    }

    #[test]
    fn test_names_flagpole_country_fallback() {
        let names = gather_names(&feature_tags([("man_made", "flagpole"), ("country", "France")]), ';');
        assert!(names.primary.is_empty());
        assert_eq!(names.alternate, vec!["France".to_string()]);
    }

    #[test]
    fn test_names_country_ignored_outside_flagpoles() {
        let names = gather_names(&feature_tags([("shop", "convenience"), ("country", "France")]), ';');
        assert!(names.is_empty());
    }

    #[test]
    fn test_names_separator_empties_everything() {
        let names = gather_names(&feature_tags([("shop", "supermarket"), ("name", "A;B"), ("brand", "A")]), ';');
        assert!(names.is_empty());

        let alt = gather_names(&feature_tags([("name", "A"), ("brand", "A;B")]), ';');
        assert!(alt.is_empty());
    }

    #[test]
    fn test_tuples_order() {
        let mut kv = Candidates::default();
        kv.insert_primary(KeyValue::new("shop", "convenience"));
        kv.insert_alternate(KeyValue::new("building", "yes"));
        let mut names = Candidates::default();
        names.insert_primary("Acme".to_string());
        names.insert_alternate("Acme Co".to_string());

        let order: Vec<(String, String)> = gather_tuples(&kv, &names)
            .into_iter()
            .map(|t| (format!("{}/{}", t.key, t.value), t.name))
            .collect();
        assert_eq!(
            order,
            vec![
                ("shop/convenience".to_string(), "Acme".to_string()),
                ("building/yes".to_string(), "Acme".to_string()),
                ("shop/convenience".to_string(), "Acme Co".to_string()),
                ("building/yes".to_string(), "Acme Co".to_string()),
            ]
        );
    }

    #[test]
    fn test_tuples_empty_when_either_side_empty() {
        let mut kv = Candidates::default();
        kv.insert_primary(KeyValue::new("shop", "convenience"));
        assert!(gather_tuples(&kv, &Candidates::default()).is_empty());
    }
}
