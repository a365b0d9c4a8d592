//! Matching engine.
//!
//! An `Engine` bundles the read-only indices with the collaborators the matching
//! operations consult. It is constructed once by the load pipeline and never
//! mutated afterwards; `Engine::empty` is the degraded stand-in used before the
//! dataset is ready.

mod generic;
mod upgrade;

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dataset::{CanonicalDataset, DissolvedSet, ReplacementTable, Trees};
use crate::error::TagMatchResult;
use crate::gather::{gather_key_values, gather_names, Candidates, KeyValue};
use crate::index::Indices;
use crate::matcher::{MatchContract, NullMatcher};
use crate::presets::{BuildingPresets, PresetClassifier};
use crate::tags::FeatureTags;

pub use upgrade::Upgrade;

/// Read-only matching engine.
#[derive(Clone)]
pub struct Engine {
    indices: Arc<Indices>,
    matcher: Arc<dyn MatchContract>,
    presets: Arc<dyn PresetClassifier>,
    config: EngineConfig,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("items", &self.indices.item_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine over built indices.
    #[must_use]
    pub fn new(
        indices: Indices,
        matcher: Arc<dyn MatchContract>,
        presets: Arc<dyn PresetClassifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            indices: Arc::new(indices),
            matcher,
            presets,
            config,
        }
    }

    /// Builds the indices and the matcher's name index directly, without the
    /// load pipeline. Location indexing is left to the caller.
    ///
    /// # Errors
    /// `TagMatchError::Shape` when `Indices::build` rejects the dataset: a
    /// malformed category key, a category naming an unknown tree, or a preserve
    /// pattern that does not compile.
    pub fn build(
        dataset: &CanonicalDataset,
        dissolved: DissolvedSet,
        replacements: ReplacementTable,
        trees: &Trees,
        mut matcher: Box<dyn MatchContract>,
        presets: Arc<dyn PresetClassifier>,
        config: EngineConfig,
    ) -> TagMatchResult<Self> {
        let indices = Indices::build(dataset, dissolved, replacements, trees)?;
        matcher.build_match_index(dataset);
        Ok(Self::new(indices, Arc::from(matcher), presets, config))
    }

    /// An engine with empty indices and a matcher that never hits.
    #[must_use]
    pub fn empty(config: EngineConfig) -> Self {
        Self::new(
            Indices::default(),
            Arc::new(NullMatcher),
            Arc::new(BuildingPresets::new()),
            config,
        )
    }

    /// The indices this engine matches against.
    #[must_use]
    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    /// Tuning knobs in effect.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Candidate `key=value` pairs for `tags`.
    #[must_use]
    pub fn gather_key_values(&self, tags: &FeatureTags) -> Candidates<KeyValue> {
        gather_key_values(tags, &self.indices, self.presets.as_ref(), &self.config)
    }

    /// Candidate names for `tags`.
    #[must_use]
    pub fn gather_names(&self, tags: &FeatureTags) -> Candidates<String> {
        gather_names(tags, self.config.list_separator)
    }
}
