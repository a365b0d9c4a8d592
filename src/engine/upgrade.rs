//! Tag upgrades.
//!
//! `Engine::upgrade` repairs stale cross-references, then walks the prioritized
//! tuple list until the matcher yields a usable item, and merges that item's
//! canonical tags into a copy of the feature.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::dataset::{CrossRefEdit, Item};
use crate::gather::gather_tuples;
use crate::index::{compile_key_pattern, mirrored_wikipedia_key};
use crate::matcher::MatchHit;
use crate::tags::{FeatureTags, Location};

use super::Engine;

#[allow(clippy::expect_used)]
static WIKIDATA_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+:)?wikidata$").expect("constant wikidata pattern is valid"));

/// Result of an upgrade that changed something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upgrade {
    /// The upgraded copy of the feature's tags.
    pub tags: FeatureTags,
    /// The canonical item applied, or `None` if only cross-references were repaired.
    pub matched: Option<String>,
}

fn apply_edit(tags: &mut FeatureTags, key: &str, edit: &CrossRefEdit) {
    match edit {
        CrossRefEdit::Set(value) => {
            tags.insert(key.to_string(), value.clone());
        }
        CrossRefEdit::Delete => {
            tags.remove(key);
        }
    }
}

impl Engine {
    /// Suggests canonical tags for a feature.
    ///
    /// Returns `None` when nothing would change. The input is never modified.
    #[must_use]
    pub fn upgrade(&self, tags: &FeatureTags, location: Option<Location>) -> Option<Upgrade> {
        let mut new_tags = tags.clone();
        let changed = self.replace_cross_refs(&mut new_tags);
        let unmatched = |new_tags: FeatureTags| {
            changed.then_some(Upgrade {
                tags: new_tags,
                matched: None,
            })
        };

        let key_values = self.gather_key_values(tags);
        if key_values.is_empty() {
            return unmatched(new_tags);
        }

        let mut names = self.gather_names(tags);
        let found_cross_ref = ["wikidata", "wikipedia"]
            .iter()
            .filter_map(|key| new_tags.get(*key))
            .find_map(|value| self.indices.canonical_cross_ref(value))
            .map(str::to_string);
        if let Some(qid) = &found_cross_ref {
            names.insert_primary(qid.clone());
        }
        if names.is_empty() {
            return unmatched(new_tags);
        }

        for tuple in gather_tuples(&key_values, &names) {
            let hits = self.matcher.find_matches(&tuple.key, &tuple.value, &tuple.name, location);
            let Some(best) = hits.first() else {
                continue;
            };
            if !best.kind.is_actionable() {
                trace!(key = %tuple.key, value = %tuple.value, name = %tuple.name, kind = ?best.kind, "skipping informational hit");
                continue;
            }
            let Some(item) = self.select_item(&hits, &new_tags) else {
                continue;
            };

            debug!(item = %item.id, key = %tuple.key, value = %tuple.value, name = %tuple.name, "matched canonical item");
            let merged = self.apply_item(tags, new_tags, item, found_cross_ref.is_some());
            return Some(Upgrade {
                tags: merged,
                matched: Some(item.id.clone()),
            });
        }

        unmatched(new_tags)
    }

    /// Rewrites `*wikidata` values listed in the replacement table, along with
    /// their mirrored `*wikipedia` attributes. Returns true if anything changed.
    fn replace_cross_refs(&self, tags: &mut FeatureTags) -> bool {
        let keys: Vec<String> = tags.keys().filter(|k| WIKIDATA_KEY.is_match(k)).cloned().collect();
        let mut changed = false;

        for key in keys {
            let Some(replacement) = tags.get(&key).and_then(|old| self.indices.replacement(old)) else {
                continue;
            };
            if let Some(edit) = &replacement.wikidata {
                apply_edit(tags, &key, edit);
                changed = true;
            }
            if let Some(edit) = &replacement.wikipedia {
                apply_edit(tags, &mirrored_wikipedia_key(&key), edit);
                changed = true;
            }
        }
        changed
    }

    /// First hit whose item is live, known, carries its cross-reference, is not
    /// vetoed by a `not:*` override, and is not a brand offered for an office.
    fn select_item(&self, hits: &[MatchHit], tags: &FeatureTags) -> Option<&Item> {
        let is_office = tags.get("office").is_some_and(|v| !v.is_empty());

        hits.iter().find_map(|hit| {
            let item_id = hit.item_id.as_deref()?;
            if self.indices.is_dissolved(item_id) {
                trace!(item = %item_id, "skipping dissolved item");
                return None;
            }
            let item = self.indices.item(item_id)?;
            let not_cross_ref = tags.get(&format!("not:{}", item.main_tag));
            let rejected = match item.cross_ref() {
                None => true,
                Some(cross_ref) => {
                    not_cross_ref.is_some_and(|n| n == cross_ref)
                        || (is_office && !item.tags.get("office").is_some_and(|v| !v.is_empty()))
                }
            };
            if rejected {
                trace!(item = %item_id, "skipping rejected item");
                return None;
            }
            Some(item)
        })
    }

    fn preserve_patterns(&self, item: &Item) -> Vec<Regex> {
        let patterns = item.preserve_tags.as_ref().or_else(|| {
            self.indices
                .category_properties(&item.tkv)
                .and_then(|p| p.preserve_tags.as_ref())
        });

        patterns
            .into_iter()
            .flatten()
            .filter_map(|pattern| match compile_key_pattern(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(item = %item.id, %pattern, error = %e, "skipping invalid preserve pattern");
                    None
                }
            })
            .collect()
    }

    /// Merges `item` into `new_tags`.
    fn apply_item(&self, original: &FeatureTags, mut new_tags: FeatureTags, item: &Item, cross_ref_matched: bool) -> FeatureTags {
        let patterns = self.preserve_patterns(item);
        let always = &self.config.always_preserve;
        let preserved: FeatureTags = new_tags
            .iter()
            .filter(|(key, _)| {
                always.iter().any(|k| k.eq_ignore_ascii_case(key)) || patterns.iter().any(|re| re.is_match(key))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        new_tags.retain(|key, _| self.indices.values_for(key).is_none());
        if cross_ref_matched {
            new_tags.remove("wikidata");
            new_tags.remove("wikipedia");
        }
        new_tags.extend(item.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        new_tags.extend(preserved);

        if original.get("type").is_some_and(|t| t == "route_master") {
            if let Some(route) = new_tags.remove("route") {
                new_tags.insert("route_master".to_string(), route);
            }
        }

        self.split_branch(original, &mut new_tags);
        new_tags
    }

    /// Recovers a local qualifier from a compound original name, e.g.
    /// "Acme Riverside" upgraded to "Acme" gets `branch=Riverside`.
    fn split_branch(&self, original: &FeatureTags, new_tags: &mut FeatureTags) {
        let Some(original_name) = original.get("name").filter(|n| !n.is_empty()) else {
            return;
        };
        let Some(new_name) = new_tags.get("name") else {
            return;
        };
        if new_name == original_name || new_tags.contains_key("branch") {
            return;
        }

        let new_names = self.gather_names(new_tags);
        if new_names.contains(original_name) {
            return;
        }

        let mut parts: Vec<&String> = new_names.iter().collect();
        parts.sort_by_key(|part| std::cmp::Reverse(part.chars().count()));

        for part in parts {
            let pattern = format!(r"^{}\s(.+)$", regex::escape(part));
            let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
                continue;
            };
            if let Some(branch) = re.captures(original_name).and_then(|c| c.get(1)) {
                debug!(name = %part, branch = branch.as_str(), "split branch from name");
                new_tags.insert("branch".to_string(), branch.as_str().to_string());
                break;
            }
        }
    }
}
