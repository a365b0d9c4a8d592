//! # tagmatch - Canonical tag upgrades for map features
//!
//! tagmatch recognizes generically tagged features (a `shop=convenience` named
//! "Acme Riverside") as specific canonical entities (the Acme brand) by matching
//! their name-like attributes against a reference dataset of brands, operators
//! and transit networks, and suggests the canonical tags.
//!
//! ## Core Concepts
//!
//! - **Category**: a `tree/key/value` bucket of canonical items
//! - **Item**: one canonical entity and the tags that describe it
//! - **Indices**: read-only reverse lookups built once after the dataset loads
//! - **Tuple**: one `(key, value, name)` attempt, tried in strict priority order
//! - **Engine**: the read-only matching context behind `upgrade` and `is_generic`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagmatch::{Collaborators, LifecycleController, SimpleMatcher, Status};
//!
//! let mut controller = LifecycleController::default();
//! controller
//!     .load(&source, Collaborators {
//!         matcher: Box::new(SimpleMatcher::new()),
//!         locations: Arc::new(locations),
//!         presets: Arc::new(presets),
//!     })
//!     .await?;
//! assert_eq!(controller.status(), Status::Ok);
//!
//! if let Some(upgrade) = controller.upgrade(&tags, None) {
//!     println!("{:?}", upgrade.tags);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod gather;
pub mod index;
pub mod lifecycle;
pub mod location;
pub mod matcher;
pub mod presets;
pub mod tags;

// Re-export primary types at crate root for convenience
pub use config::EngineConfig;
pub use dataset::{
    CanonicalDataset, Category, CategoryProperties, CrossRefEdit, DissolvedSet, Item, LocationSet, Replacement,
    ReplacementTable, Resource, Tree, Trees,
};
pub use engine::{Engine, Upgrade};
pub use error::{DataShapeError, LoadError, TagMatchError, TagMatchResult};
pub use gather::{gather_key_values, gather_names, gather_tuples, Candidates, KeyValue, NameContext, Tuple};
pub use index::Indices;
pub use lifecycle::{Collaborators, DatasetSource, LifecycleController, LoadReport, StaticSource, Status};
pub use location::{CountryLocationService, LocationService};
pub use matcher::{MatchContract, MatchHit, MatchKind, NullMatcher, SimpleMatcher};
pub use presets::{BuildingPresets, PresetClassifier, PresetMatch};
pub use tags::{feature_tags, FeatureTags, Geometry, Location};
