//! Feature attribute sets and the small value types passed alongside them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One feature's raw attributes.
///
/// The engine never mutates a caller's map; every transformation works on a copy.
pub type FeatureTags = BTreeMap<String, String>;

/// Builds a [`FeatureTags`] from string pairs.
///
/// ```
/// let tags = tagmatch::tags::feature_tags([("shop", "convenience"), ("name", "Acme")]);
/// assert_eq!(tags.get("shop").map(String::as_str), Some("convenience"));
/// ```
#[must_use]
pub fn feature_tags<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> FeatureTags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A point location in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
}

impl Location {
    /// Creates a location from longitude and latitude.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lon, self.lat)
    }
}

/// Geometry kind used when asking the preset classifier about a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    /// A lone node.
    Point,
    /// A node that is part of a way.
    Vertex,
    /// An open way.
    Line,
    /// A closed way or multipolygon.
    Area,
    /// A relation.
    Relation,
}

impl Geometry {
    /// Returns the lowercase name of this geometry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Vertex => "vertex",
            Self::Line => "line",
            Self::Area => "area",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
