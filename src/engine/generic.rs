//! Generic-name detection.

use crate::gather::{gather_tuples, Candidates};
use crate::matcher::MatchKind;
use crate::tags::FeatureTags;

use super::Engine;

impl Engine {
    /// Returns true if the feature's `name` is flagged by the dataset as too
    /// generic to identify a brand for any of its `key=value` pairs.
    #[must_use]
    pub fn is_generic(&self, tags: &FeatureTags) -> bool {
        let Some(name) = tags.get("name").filter(|n| !n.is_empty()) else {
            return false;
        };
        let mut names = Candidates::default();
        names.insert_primary(name.clone());

        let key_values = self.gather_key_values(tags);
        if key_values.is_empty() {
            return false;
        }

        gather_tuples(&key_values, &names).iter().any(|tuple| {
            self.matcher
                .find_matches(&tuple.key, &tuple.value, &tuple.name, None)
                .first()
                .is_some_and(|hit| hit.kind == MatchKind::ExcludeGeneric)
        })
    }
}
