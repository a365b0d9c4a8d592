//! Location collaborator.
//!
//! The matcher consults a `LocationService` to decide whether an item's
//! `locationSet` covers the feature being matched. Custom geofences arrive as a
//! GeoJSON feature collection during load and only become usable after
//! `resolve_pending` completes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::dataset::LocationSet;
use crate::error::LoadError;
use crate::tags::Location;

/// Region code covering the whole world.
pub const WORLD: &str = "001";

/// Geofence containment service.
#[async_trait]
pub trait LocationService: Send + Sync {
    /// Registers custom geofences from a GeoJSON feature collection. Returns how many were queued.
    fn merge_custom_features(&self, features: &serde_json::Value) -> Result<usize, LoadError>;

    /// Resolves every queued geofence so that it can be used by `contains`.
    async fn resolve_pending(&self) -> Result<(), LoadError>;

    /// Returns true if `location` falls inside `set`.
    fn contains(&self, set: &LocationSet, location: Location) -> bool;
}

type Ring = Vec<(f64, f64)>;

/// Ray-casting point-in-polygon test against a closed ring of `(lon, lat)` pairs.
fn ring_contains(ring: &[(f64, f64)], location: Location) -> bool {
    let (x, y) = (location.lon, location.lat);
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn parse_ring(value: &serde_json::Value) -> Option<Ring> {
    value
        .as_array()?
        .iter()
        .map(|pair| {
            let pair = pair.as_array()?;
            Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
        })
        .collect()
}

/// Outer rings of a Polygon or MultiPolygon geometry.
fn parse_outer_rings(geometry: &serde_json::Value) -> Option<Vec<Ring>> {
    let coordinates = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Polygon" => Some(vec![parse_ring(coordinates.as_array()?.first()?)?]),
        "MultiPolygon" => coordinates
            .as_array()?
            .iter()
            .map(|polygon| parse_ring(polygon.as_array()?.first()?))
            .collect(),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct GeofenceState {
    pending: BTreeMap<String, Vec<Ring>>,
    resolved: BTreeMap<String, Vec<Ring>>,
}

/// Reference location service.
///
/// Built-in regions are answered by a caller-supplied resolver that lists the
/// region codes containing a point. Custom geofences are polygons keyed by their
/// feature id (for example `acme_area.geojson`).
pub struct CountryLocationService {
    regions_at: Box<dyn Fn(Location) -> Vec<String> + Send + Sync>,
    state: RwLock<GeofenceState>,
}

impl fmt::Debug for CountryLocationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountryLocationService").finish_non_exhaustive()
    }
}

impl CountryLocationService {
    /// Creates a service using `regions_at` to list the region codes containing a point.
    pub fn new(regions_at: impl Fn(Location) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            regions_at: Box::new(regions_at),
            state: RwLock::new(GeofenceState::default()),
        }
    }

    /// A service that places every point only in the world region.
    #[must_use]
    pub fn world_only() -> Self {
        Self::new(|_| Vec::new())
    }

    /// Number of resolved custom geofences.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.state.read().map(|s| s.resolved.len()).unwrap_or(0)
    }

    fn regions_containing(&self, location: Location) -> HashSet<String> {
        let mut regions: HashSet<String> = (self.regions_at)(location)
            .into_iter()
            .map(|r| r.to_ascii_lowercase())
            .collect();
        regions.insert(WORLD.to_string());

        if let Ok(state) = self.state.read() {
            for (id, rings) in &state.resolved {
                if rings.iter().any(|ring| ring_contains(ring, location)) {
                    regions.insert(id.to_ascii_lowercase());
                }
            }
        }
        regions
    }
}

#[async_trait]
impl LocationService for CountryLocationService {
    fn merge_custom_features(&self, features: &serde_json::Value) -> Result<usize, LoadError> {
        let list = features
            .get("features")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| LoadError::Location {
                message: "feature collection has no 'features' array".to_string(),
            })?;

        let mut state = self.state.write().map_err(|_| LoadError::Location {
            message: "poisoned lock: geofences".to_string(),
        })?;

        let mut queued = 0;
        for feature in list {
            let id = feature
                .get("id")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| LoadError::Location {
                    message: "custom feature has no string id".to_string(),
                })?;
            let rings = feature
                .get("geometry")
                .and_then(parse_outer_rings)
                .ok_or_else(|| LoadError::Location {
                    message: format!("custom feature '{id}' is not a polygon"),
                })?;
            state.pending.insert(id.to_string(), rings);
            queued += 1;
        }
        Ok(queued)
    }

    async fn resolve_pending(&self) -> Result<(), LoadError> {
        tokio::task::yield_now().await;
        let mut state = self.state.write().map_err(|_| LoadError::Location {
            message: "poisoned lock: geofences".to_string(),
        })?;
        let pending = std::mem::take(&mut state.pending);
        debug!(geofences = pending.len(), "resolved pending location sets");
        state.resolved.extend(pending);
        Ok(())
    }

    fn contains(&self, set: &LocationSet, location: Location) -> bool {
        if set.is_worldwide() {
            return true;
        }
        let regions = self.regions_containing(location);
        let hit = |codes: &[String]| codes.iter().any(|c| regions.contains(&c.to_ascii_lowercase()));
        (set.include.is_empty() || hit(&set.include)) && !hit(&set.exclude)
    }
}
