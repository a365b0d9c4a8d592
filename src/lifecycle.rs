//! Dataset lifecycle.
//!
//! The load pipeline fetches every resource in sequence, builds the indices and
//! the matcher's name index, waits a short settle delay, resolves pending
//! geofences and finally builds the matcher's location index. Stages never
//! overlap, and a failure at any stage is terminal.
//!
//! The `LifecycleController` owns the current `Engine`. Until the pipeline
//! succeeds it serves an empty engine, so matching degrades to "no match"
//! instead of failing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dataset::{CanonicalDataset, DissolvedSet, ReplacementTable, Resource, Trees};
use crate::engine::{Engine, Upgrade};
use crate::error::LoadError;
use crate::index::Indices;
use crate::location::LocationService;
use crate::matcher::MatchContract;
use crate::presets::PresetClassifier;
use crate::tags::{FeatureTags, Location};

/// Dataset readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The dataset has not finished loading.
    Loading,
    /// Indices are built and matching is live.
    Ok,
    /// Loading failed; matching stays degraded for good.
    Failed,
}

/// Source of the JSON resources the pipeline consumes.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetches one resource.
    async fn fetch(&self, resource: Resource) -> Result<serde_json::Value, LoadError>;
}

/// In-memory dataset source.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    resources: HashMap<Resource, serde_json::Value>,
}

impl StaticSource {
    /// A source with no resources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a resource.
    #[must_use]
    pub fn with(mut self, resource: Resource, value: serde_json::Value) -> Self {
        self.resources.insert(resource, value);
        self
    }
}

#[async_trait]
impl DatasetSource for StaticSource {
    async fn fetch(&self, resource: Resource) -> Result<serde_json::Value, LoadError> {
        self.resources
            .get(&resource)
            .cloned()
            .ok_or_else(|| LoadError::Fetch {
                resource,
                message: "resource not available".to_string(),
            })
    }
}

/// The external services the pipeline wires into the engine.
pub struct Collaborators {
    /// Ranked matcher; its indices are built during load.
    pub matcher: Box<dyn MatchContract>,
    /// Geofence containment service.
    pub locations: Arc<dyn LocationService>,
    /// Preset classifier used for the generic building fallback.
    pub presets: Arc<dyn PresetClassifier>,
}

/// Summary of a completed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// When the pipeline started.
    pub started_at: DateTime<Utc>,
    /// When the engine was installed.
    pub finished_at: DateTime<Utc>,
    /// Categories indexed.
    pub categories: usize,
    /// Items indexed.
    pub items: usize,
    /// Custom geofences merged into the location service.
    pub custom_locations: usize,
}

#[derive(Debug)]
enum LoadState {
    Loading,
    Ready(LoadReport),
    Failed(String),
}

async fn fetch(source: &dyn DatasetSource, resource: Resource) -> Result<serde_json::Value, LoadError> {
    debug!(%resource, "fetching resource");
    source.fetch(resource).await
}

async fn run_pipeline(
    source: &dyn DatasetSource,
    collaborators: Collaborators,
    config: &EngineConfig,
) -> Result<(Engine, LoadReport), LoadError> {
    let started_at = Utc::now();
    let Collaborators {
        mut matcher,
        locations,
        presets,
    } = collaborators;

    let bundle = fetch(source, Resource::Presets).await?;
    presets.merge(&bundle)?;
    let features = fetch(source, Resource::Features).await?;
    let custom_locations = locations.merge_custom_features(&features)?;

    let dataset = CanonicalDataset::from_json(fetch(source, Resource::Dataset).await?)?;
    let dissolved = DissolvedSet::from_json(fetch(source, Resource::Dissolved).await?)?;
    let replacements = ReplacementTable::from_json(fetch(source, Resource::Replacements).await?)?;
    let trees = Trees::from_json(fetch(source, Resource::Trees).await?)?;

    let indices = Indices::build(&dataset, dissolved, replacements, &trees)?;
    matcher.build_match_index(&dataset);

    tokio::time::sleep(config.settle_delay).await;

    locations.resolve_pending().await?;
    matcher.build_location_index(&dataset, Arc::clone(&locations));

    let report = LoadReport {
        started_at,
        finished_at: Utc::now(),
        categories: indices.category_count(),
        items: indices.item_count(),
        custom_locations,
    };
    let engine = Engine::new(indices, Arc::from(matcher), presets, config.clone());
    Ok((engine, report))
}

/// Tracks dataset readiness and serves the current engine.
#[derive(Debug)]
pub struct LifecycleController {
    state: LoadState,
    engine: Arc<Engine>,
    config: EngineConfig,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl LifecycleController {
    /// Creates a controller in the `Loading` state with an empty engine.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: LoadState::Loading,
            engine: Arc::new(Engine::empty(config.clone())),
            config,
        }
    }

    /// Current readiness.
    #[must_use]
    pub fn status(&self) -> Status {
        match self.state {
            LoadState::Loading => Status::Loading,
            LoadState::Ready(_) => Status::Ok,
            LoadState::Failed(_) => Status::Failed,
        }
    }

    /// Runs the load pipeline.
    ///
    /// Loading an already loaded controller is a no-op. A controller whose load
    /// failed stays failed and returns `AlreadyFailed`.
    pub async fn load(&mut self, source: &dyn DatasetSource, collaborators: Collaborators) -> Result<&LoadReport, LoadError> {
        match self.state {
            LoadState::Failed(_) => return Err(LoadError::AlreadyFailed),
            LoadState::Ready(_) => {
                debug!("dataset already loaded");
            }
            LoadState::Loading => {
                info!("loading canonical dataset");
                match run_pipeline(source, collaborators, &self.config).await {
                    Ok((engine, report)) => {
                        info!(
                            categories = report.categories,
                            items = report.items,
                            custom_locations = report.custom_locations,
                            "canonical dataset ready"
                        );
                        self.engine = Arc::new(engine);
                        self.state = LoadState::Ready(report);
                    }
                    Err(e) => {
                        warn!(error = %e, "canonical dataset load failed");
                        self.state = LoadState::Failed(e.to_string());
                        return Err(e);
                    }
                }
            }
        }

        match &self.state {
            LoadState::Ready(report) => Ok(report),
            _ => Err(LoadError::AlreadyFailed),
        }
    }

    /// Report of the completed load, once `Ok`.
    #[must_use]
    pub fn report(&self) -> Option<&LoadReport> {
        match &self.state {
            LoadState::Ready(report) => Some(report),
            _ => None,
        }
    }

    /// Failure message, once `Failed`.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Shared handle to the current engine.
    #[must_use]
    pub fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }

    /// See [`Engine::upgrade`].
    #[must_use]
    pub fn upgrade(&self, tags: &FeatureTags, location: Option<Location>) -> Option<Upgrade> {
        self.engine.upgrade(tags, location)
    }

    /// See [`Engine::is_generic`].
    #[must_use]
    pub fn is_generic(&self, tags: &FeatureTags) -> bool {
        self.engine.is_generic(tags)
    }

    /// The indices currently served, for diagnostics.
    #[must_use]
    pub fn raw_indices(&self) -> &Indices {
        self.engine.indices()
    }
}
