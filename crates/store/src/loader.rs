//! Layer loader: one independent fetch per configured layer, installed atomically on completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use atlas_core::FeatureKind;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{parse_layer, FeatureStore, LoadError};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a layer's raw document comes from.
#[async_trait::async_trait]
pub trait LayerSource: Send + Sync {
    /// Short description for logs and reports (path, url, "inline").
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<String, LoadError>;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl LayerSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| LoadError::Io { path: self.describe(), source })
    }
}

/// In-memory document; useful for embedding and tests.
pub struct StaticSource {
    text: String,
}

impl StaticSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait::async_trait]
impl LayerSource for StaticSource {
    fn describe(&self) -> String {
        "inline".to_string()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        Ok(self.text.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LayerOutcome {
    Loaded { features: usize, skipped: usize },
    Failed { reason: String },
    /// No source configured; the layer stays `NotLoaded`.
    NotConfigured,
    /// The store was torn down before the load completed.
    Discarded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerReport {
    pub kind: FeatureKind,
    pub source: Option<String>,
    pub outcome: LayerOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub layers: Vec<LayerReport>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    pub fn get(&self, kind: FeatureKind) -> Option<&LayerReport> {
        self.layers.iter().find(|r| r.kind == kind)
    }

    pub fn loaded(&self, kind: FeatureKind) -> bool {
        matches!(self.get(kind).map(|r| &r.outcome), Some(LayerOutcome::Loaded { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = (FeatureKind, &str)> {
        self.layers.iter().filter_map(|r| match &r.outcome {
            LayerOutcome::Failed { reason } => Some((r.kind, reason.as_str())),
            _ => None,
        })
    }
}

/// Populates a [`FeatureStore`]. There is no retry here; a manual reload is another `load_all`.
#[derive(Clone)]
pub struct LayerLoader {
    store: Arc<FeatureStore>,
    sources: Vec<(FeatureKind, Arc<dyn LayerSource>)>,
    timeout: Duration,
}

impl LayerLoader {
    pub fn new(store: Arc<FeatureStore>) -> Self {
        Self { store, sources: Vec::new(), timeout: DEFAULT_FETCH_TIMEOUT }
    }

    /// Configure (or replace) the source for one layer.
    pub fn with_source(mut self, kind: FeatureKind, source: impl LayerSource + 'static) -> Self {
        self.sources.retain(|(k, _)| *k != kind);
        self.sources.push((kind, Arc::new(source)));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    fn source_for(&self, kind: FeatureKind) -> Option<Arc<dyn LayerSource>> {
        self.sources.iter().find(|(k, _)| *k == kind).map(|(_, s)| Arc::clone(s))
    }

    /// Fetch every configured layer concurrently. Each layer lands in the store as soon as
    /// its own fetch finishes; a failure only affects that layer.
    pub async fn load_all(&self) -> LoadReport {
        let started = Instant::now();
        let futs = FeatureKind::ALL.into_iter().map(|kind| self.load_layer(kind));
        let layers = join_all(futs).await;
        let loaded = layers.iter().filter(|r| matches!(r.outcome, LayerOutcome::Loaded { .. })).count();
        info!(loaded, total = layers.len(), elapsed_ms = started.elapsed().as_millis() as u64, "layer load finished");
        LoadReport { layers, finished_at: Utc::now() }
    }

    /// Load a single layer (also the manual "reload" entry point).
    pub async fn load_layer(&self, kind: FeatureKind) -> LayerReport {
        let started = Instant::now();
        let Some(source) = self.source_for(kind) else {
            debug!(layer = %kind, "no source configured");
            return LayerReport { kind, source: None, outcome: LayerOutcome::NotConfigured, elapsed_ms: 0 };
        };
        let described = source.describe();
        let outcome = self.fetch_and_install(kind, source.as_ref(), &described).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        histogram!("layer_load_ms", elapsed_ms as f64, "layer" => kind.as_str());
        let label = match &outcome {
            LayerOutcome::Loaded { .. } => "loaded",
            LayerOutcome::Failed { .. } => "failed",
            LayerOutcome::NotConfigured => "not_configured",
            LayerOutcome::Discarded => "discarded",
        };
        counter!("layer_loads_total", 1u64, "layer" => kind.as_str(), "outcome" => label);
        LayerReport { kind, source: Some(described), outcome, elapsed_ms }
    }

    async fn fetch_and_install(&self, kind: FeatureKind, source: &dyn LayerSource, described: &str) -> LayerOutcome {
        if !self.store.begin_loading(kind) {
            return LayerOutcome::Discarded;
        }
        debug!(layer = %kind, source = %described, "fetching layer");
        let parsed = match tokio::time::timeout(self.timeout, source.fetch()).await {
            Ok(Ok(text)) => parse_layer(kind, &text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LoadError::Timeout(self.timeout)),
        };
        match parsed {
            Ok(p) => {
                let (features, skipped) = (p.features.len(), p.skipped);
                if !self.store.install(kind, p.features, p.skipped) {
                    debug!(layer = %kind, "late completion after teardown ignored");
                    return LayerOutcome::Discarded;
                }
                gauge!("layer_features", features as f64, "layer" => kind.as_str());
                info!(layer = %kind, features, skipped, "layer loaded");
                LayerOutcome::Loaded { features, skipped }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(layer = %kind, source = %described, error = %reason, "layer load failed");
                if !self.store.fail(kind, reason.clone()) {
                    return LayerOutcome::Discarded;
                }
                LayerOutcome::Failed { reason }
            }
        }
    }
}

/// Run `load_all` on the tokio runtime and hand back its report.
pub fn spawn_load_all(loader: LayerLoader) -> JoinHandle<LoadReport> {
    tokio::spawn(async move { loader.load_all().await })
}
