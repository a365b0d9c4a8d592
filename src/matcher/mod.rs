//! Ranked matcher contract.
//!
//! The engine never looks inside a matcher. It builds the match index once after
//! the dataset loads, builds the location index once the location service has
//! resolved its geofences, and then only calls `find_matches`. Any lexical or
//! geographic matcher can sit behind this trait.

/// Lexical reference implementation.
pub mod simple;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dataset::CanonicalDataset;
use crate::location::LocationService;
use crate::tags::Location;

pub use simple::SimpleMatcher;

/// How a hit relates to the queried name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    /// The name is one of the item's own names.
    Primary,
    /// The name is one of the item's alternate spellings.
    Alternate,
    /// The name is too generic to identify any brand for this key/value.
    ExcludeGeneric,
    /// The name belongs to something outside the dataset.
    ExcludeNamed,
}

impl MatchKind {
    /// Returns true for the kinds an upgrade may act on.
    #[must_use]
    pub const fn is_actionable(self) -> bool {
        matches!(self, Self::Primary | Self::Alternate)
    }
}

/// One ranked matcher result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHit {
    /// Matched item. Exclusion hits carry none.
    pub item_id: Option<String>,
    /// How the name matched.
    #[serde(rename = "match")]
    pub kind: MatchKind,
}

impl MatchHit {
    /// A hit on `item_id`.
    #[must_use]
    pub fn item(item_id: impl Into<String>, kind: MatchKind) -> Self {
        Self {
            item_id: Some(item_id.into()),
            kind,
        }
    }

    /// An informational hit with no item.
    #[must_use]
    pub const fn informational(kind: MatchKind) -> Self {
        Self { item_id: None, kind }
    }
}

/// Ranked matcher over the canonical dataset.
pub trait MatchContract: Send + Sync {
    /// One-time name index construction, called after the dataset loads.
    fn build_match_index(&mut self, dataset: &CanonicalDataset);

    /// One-time location index construction, called after pending geofences resolve.
    fn build_location_index(&mut self, dataset: &CanonicalDataset, locations: Arc<dyn LocationService>);

    /// Hits for `name` under `key=value`, most likely first.
    ///
    /// Item ids are not guaranteed unique across hits.
    fn find_matches(&self, key: &str, value: &str, name: &str, location: Option<Location>) -> Vec<MatchHit>;
}

/// Matcher with no index; every query misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMatcher;

impl MatchContract for NullMatcher {
    fn build_match_index(&mut self, _dataset: &CanonicalDataset) {}

    fn build_location_index(&mut self, _dataset: &CanonicalDataset, _locations: Arc<dyn LocationService>) {}

    fn find_matches(&self, _key: &str, _value: &str, _name: &str, _location: Option<Location>) -> Vec<MatchHit> {
        Vec::new()
    }
}
