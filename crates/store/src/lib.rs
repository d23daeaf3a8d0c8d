//! Atlas store: per-layer feature collections with atomic installs, plus the layer loader.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use atlas_core::{Feature, FeatureKind};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

mod loader;
mod parse;

pub use loader::{
    spawn_load_all, FileSource, LayerLoader, LayerOutcome, LayerReport, LayerSource, LoadReport, StaticSource,
};
pub use parse::{parse_layer, ParsedLayer};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing geojson: {0}")]
    Parse(#[from] geojson::Error),
    #[error("expected a FeatureCollection document")]
    NotFeatureCollection,
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("source: {0}")]
    Source(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed(String),
}

impl LoadState {
    pub fn label(&self) -> &'static str {
        match self {
            LoadState::NotLoaded => "not loaded",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Failed(_) => "failed",
        }
    }
}

/// Features of one kind plus the state of their most recent load.
/// `features` is only ever non-empty while `state == Loaded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub kind: FeatureKind,
    pub state: LoadState,
    pub features: Vec<Feature>,
    /// Source records dropped while parsing the last successful load.
    pub skipped: usize,
}

impl Layer {
    fn empty(kind: FeatureKind, state: LoadState) -> Self {
        Self { kind, state, features: Vec::new(), skipped: 0 }
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn find(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id.as_str() == id)
    }
}

/// In-memory aggregate of all layers.
///
/// Readers take cheap `Arc<Layer>` snapshots. Writes are reserved to the loader and are
/// whole-layer swaps, so a reader never observes a partially installed layer. Once
/// `close()` has been called every write is dropped.
pub struct FeatureStore {
    layers: [ArcSwap<Layer>; 4],
    closed: AtomicBool,
    write_lock: Mutex<()>,
    epoch: AtomicU64,
    epoch_tx: watch::Sender<u64>,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStore {
    pub fn new() -> Self {
        let (epoch_tx, _rx) = watch::channel(0u64);
        Self {
            layers: std::array::from_fn(|i| {
                ArcSwap::from_pointee(Layer::empty(FeatureKind::ALL[i], LoadState::NotLoaded))
            }),
            closed: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
            epoch_tx,
        }
    }

    pub fn layer(&self, kind: FeatureKind) -> Arc<Layer> {
        self.layers[kind.index()].load_full()
    }

    pub fn state(&self, kind: FeatureKind) -> LoadState {
        self.layers[kind.index()].load().state.clone()
    }

    /// Bumped on every layer write.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> {
        self.epoch_tx.subscribe()
    }

    /// Tear down: in-flight loads that complete afterwards become no-ops.
    pub fn close(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.closed.store(true, Ordering::Release);
        debug!("feature store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn begin_loading(&self, kind: FeatureKind) -> bool {
        self.swap(kind, Layer::empty(kind, LoadState::Loading))
    }

    pub(crate) fn install(&self, kind: FeatureKind, features: Vec<Feature>, skipped: usize) -> bool {
        self.swap(kind, Layer { kind, state: LoadState::Loaded, features, skipped })
    }

    pub(crate) fn fail(&self, kind: FeatureKind, reason: String) -> bool {
        self.swap(kind, Layer::empty(kind, LoadState::Failed(reason)))
    }

    fn swap(&self, kind: FeatureKind, next: Layer) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.closed.load(Ordering::Acquire) {
            debug!(layer = %kind, state = next.state.label(), "store closed; dropping layer write");
            return false;
        }
        self.layers[kind.index()].store(Arc::new(next));
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.epoch_tx.send_replace(epoch);
        true
    }
}
