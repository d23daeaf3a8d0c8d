//! Atlas engine façade.
//!
//! [`AtlasEngine`] ties the shared [`FeatureStore`] to a [`MapRenderer`]: it owns the filter
//! state, the selection, the highlight, layer visibility and the registry of drawn shapes.
//! The store is only read here; the loader is its sole writer.

#![forbid(unsafe_code)]

use std::sync::Arc;

use atlas_core::{Feature, FeatureId, FeatureKey, FeatureKind};
use atlas_filter::{apply_filters, compute_options, ClaimSummary, FilterAction, FilterOptions, FilterState};
use atlas_render::{draw_feature, MapRenderer};
use atlas_store::{FeatureStore, Layer, LoadState};
use metrics::{counter, gauge};
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info, warn};

mod config;
mod error;
pub mod export;
pub mod highlight;
mod popup;
pub mod registry;
pub mod selection;

pub use config::{AtlasConfig, LayerSources};
pub use error::{ConfigError, HighlightError};
pub use export::{export_csv, CsvDocument};
pub use highlight::HighlightController;
pub use popup::popup_for;
pub use registry::RenderRegistry;
pub use selection::{Selection, SelectionController};

/// One row of the layer panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerView {
    pub kind: FeatureKind,
    pub state: LoadState,
    pub visible: bool,
    pub features: usize,
    pub skipped: usize,
    pub drawn: usize,
}

pub struct AtlasEngine<R: MapRenderer> {
    config: AtlasConfig,
    store: Arc<FeatureStore>,
    renderer: R,
    registry: RenderRegistry,
    filters: FilterState,
    selection: SelectionController,
    highlight: HighlightController,
    visible: [bool; 4],
    snapshot: [Arc<Layer>; 4],
    seen_epoch: u64,
    torn_down: bool,
}

impl<R: MapRenderer> AtlasEngine<R> {
    /// Build over whatever the store holds now and draw it. Call [`refresh`](Self::refresh)
    /// as loads complete.
    pub fn new(store: Arc<FeatureStore>, renderer: R, config: AtlasConfig) -> Self {
        let snapshot = std::array::from_fn(|i| store.layer(FeatureKind::ALL[i]));
        let mut engine = Self {
            selection: SelectionController::new(config.point_focus_zoom),
            highlight: HighlightController::new(
                config.highlight_layer,
                config.highlight_property.clone(),
                config.highlight_max_zoom,
            ),
            seen_epoch: store.epoch(),
            config,
            store,
            renderer,
            registry: RenderRegistry::new(),
            filters: FilterState::default(),
            visible: [true; 4],
            snapshot,
            torn_down: false,
        };
        for kind in FeatureKind::ALL {
            engine.sync_layer(kind);
        }
        engine.publish_filtered();
        engine
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub fn registry(&self) -> &RenderRegistry {
        &self.registry
    }

    fn snapshot(&self, kind: FeatureKind) -> Arc<Layer> {
        Arc::clone(&self.snapshot[kind.index()])
    }

    /// Pick up layers written since the last call. Reloaded layers are redrawn from scratch
    /// and the filters are reconciled against the new claims. Returns whether anything changed.
    pub fn refresh(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        let epoch = self.store.epoch();
        if epoch == self.seen_epoch {
            return false;
        }
        self.seen_epoch = epoch;
        let mut changed = Vec::new();
        for kind in FeatureKind::ALL {
            let fresh = self.store.layer(kind);
            if !Arc::ptr_eq(&fresh, &self.snapshot[kind.index()]) {
                self.snapshot[kind.index()] = fresh;
                changed.push(kind);
            }
        }
        for &kind in &changed {
            self.drop_shapes(kind);
            if let Some(active) = self.highlight.active().cloned() {
                if active.kind == kind {
                    match self.snapshot[kind.index()].find(active.id.as_str()) {
                        Some(f) => self.highlight.rebase(f),
                        None => {
                            debug!(feature = %active, "highlighted feature gone after reload");
                            self.highlight.forget();
                        }
                    }
                }
            }
        }
        if changed.contains(&FeatureKind::Claims) {
            let claims = self.snapshot(FeatureKind::Claims);
            self.filters = self.filters.reconcile(&claims.features);
        }
        for &kind in &changed {
            self.sync_layer(kind);
        }
        self.publish_filtered();
        info!(epoch, layers = ?changed, "engine refreshed");
        !changed.is_empty()
    }

    fn drop_shapes(&mut self, kind: FeatureKind) {
        for key in self.registry.keys_of(kind) {
            if let Some(d) = self.registry.remove(&key) {
                self.renderer.remove(d.shape);
            }
        }
    }

    /// Bring the drawn shapes of one layer in line with visibility and, for claims, the filters.
    fn sync_layer(&mut self, kind: FeatureKind) {
        if self.torn_down {
            return;
        }
        let layer = self.snapshot(kind);
        let wanted: Vec<&Feature> = if !self.visible[kind.index()] {
            Vec::new()
        } else if kind == FeatureKind::Claims {
            apply_filters(&layer.features, &self.filters)
        } else {
            layer.features.iter().collect()
        };
        let keep: FxHashSet<FeatureKey> = wanted.iter().map(|f| f.key()).collect();
        for key in self.registry.keys_of(kind) {
            if !keep.contains(&key) {
                if let Some(d) = self.registry.remove(&key) {
                    self.renderer.remove(d.shape);
                }
            }
        }
        for f in wanted {
            let key = f.key();
            if self.registry.contains(&key) {
                continue;
            }
            let style = self.highlight.style_for(f);
            let shape = draw_feature(&mut self.renderer, f, &style);
            self.registry.insert(key, shape, style);
        }
        self.settle_selection();
    }

    fn settle_selection(&mut self) {
        if !self.selection.pending_focus() {
            return;
        }
        let Some(key) = self.selection.current().cloned() else {
            return;
        };
        let layer = self.snapshot(key.kind);
        if let Some(f) = layer.find(key.id.as_str()) {
            let drawn = self.registry.contains(&key);
            self.selection.settle(&mut self.renderer, f, drawn);
        }
    }

    /// Publish the filtered count and drop a selection the filters no longer show.
    fn publish_filtered(&mut self) {
        let claims = self.snapshot(FeatureKind::Claims);
        let hits = apply_filters(&claims.features, &self.filters);
        gauge!("filtered_claims", hits.len() as f64);
        let gone = self.selection.current().map(|k| !hits.iter().any(|f| f.key() == *k)).unwrap_or(false);
        if gone {
            debug!("selected claim filtered out");
            self.selection.clear();
        }
    }

    // ---- filters ----

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Apply one filter transition and redraw the claims it leaves visible.
    pub fn dispatch(&mut self, action: FilterAction) -> &FilterState {
        let claims = self.snapshot(FeatureKind::Claims);
        let next = self.filters.reduce(action, &claims.features);
        if next != self.filters {
            debug!(filters = ?next, "filters changed");
            self.filters = next;
            self.sync_layer(FeatureKind::Claims);
            self.publish_filtered();
        }
        &self.filters
    }

    pub fn options(&self) -> FilterOptions {
        compute_options(&self.snapshot[FeatureKind::Claims.index()].features, &self.filters)
    }

    /// Claims passing the current filters, in store order.
    pub fn filtered(&self) -> Vec<&Feature> {
        apply_filters(&self.snapshot[FeatureKind::Claims.index()].features, &self.filters)
    }

    pub fn summary(&self) -> ClaimSummary {
        ClaimSummary::of(self.filtered())
    }

    pub fn export_csv(&self) -> CsvDocument {
        export_csv(self.filtered(), &self.config.export_filename)
    }

    // ---- selection ----

    /// List-panel entry point.
    pub fn select(&mut self, id: &str) -> bool {
        self.select_key(&FeatureKey::new(FeatureKind::Claims, id))
    }

    /// Map entry point. A claim click is the same transition as [`select`](Self::select);
    /// any other shape just shows its details.
    pub fn on_map_click(&mut self, key: &FeatureKey) -> bool {
        if self.torn_down {
            return false;
        }
        if key.kind == FeatureKind::Claims {
            return self.select_key(key);
        }
        let layer = self.snapshot(key.kind);
        match layer.find(key.id.as_str()) {
            Some(f) if self.registry.contains(key) => {
                let anchor = f.bounds().map(|b| b.center());
                if let Some(anchor) = anchor {
                    self.renderer.open_popup(key, anchor, &popup_for(f));
                }
                true
            }
            _ => {
                debug!(feature = %key, "click on unknown shape ignored");
                false
            }
        }
    }

    fn select_key(&mut self, key: &FeatureKey) -> bool {
        if self.torn_down {
            return false;
        }
        if key.kind != FeatureKind::Claims || !self.filtered().iter().any(|f| f.id == key.id) {
            debug!(feature = %key, "not in filtered list; selection unchanged");
            return false;
        }
        self.selection.select(key.clone());
        self.settle_selection();
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn current_selection(&self) -> Option<&FeatureId> {
        self.selection.current().map(|k| &k.id)
    }

    pub fn selection(&self) -> &Selection {
        self.selection.state()
    }

    // ---- highlight ----

    /// Highlight the feature of the configured layer whose identifier property equals
    /// `identifier` exactly. Every error leaves the current highlight untouched.
    pub fn highlight(&mut self, identifier: &str) -> Result<FeatureId, HighlightError> {
        let result = self.try_highlight(identifier);
        if let Err(e) = &result {
            let reason = match e {
                HighlightError::NotFound { .. } => "not_found",
                HighlightError::EmptyIdentifier => "empty",
                HighlightError::LayerNotLoaded { .. } => "not_loaded",
                HighlightError::TornDown => "torn_down",
            };
            counter!("highlight_misses_total", 1u64, "reason" => reason);
            warn!(identifier, error = %e, "highlight missed");
        }
        result
    }

    fn try_highlight(&mut self, identifier: &str) -> Result<FeatureId, HighlightError> {
        if self.torn_down {
            return Err(HighlightError::TornDown);
        }
        if identifier.trim().is_empty() {
            return Err(HighlightError::EmptyIdentifier);
        }
        let kind = self.highlight.layer();
        let layer = self.snapshot(kind);
        if !layer.is_loaded() {
            return Err(HighlightError::LayerNotLoaded { layer: kind });
        }
        let feature = self
            .highlight
            .find(&layer.features, identifier)
            .ok_or_else(|| HighlightError::NotFound { identifier: identifier.to_string() })?;
        if !self.visible[kind.index()] {
            info!(layer = %kind, "showing layer for highlight");
            self.visible[kind.index()] = true;
            self.sync_layer(kind);
        }
        self.highlight.apply(&mut self.renderer, &mut self.registry, feature);
        Ok(feature.id.clone())
    }

    pub fn clear_highlight(&mut self) -> bool {
        self.highlight.clear(&mut self.renderer, &mut self.registry)
    }

    pub fn highlighted(&self) -> Option<&FeatureKey> {
        self.highlight.active()
    }

    // ---- layers ----

    pub fn set_layer_visible(&mut self, kind: FeatureKind, visible: bool) {
        if self.visible[kind.index()] != visible {
            self.visible[kind.index()] = visible;
            self.sync_layer(kind);
        }
    }

    pub fn layers(&self) -> Vec<LayerView> {
        FeatureKind::ALL
            .into_iter()
            .map(|kind| {
                let layer = &self.snapshot[kind.index()];
                LayerView {
                    kind,
                    state: layer.state.clone(),
                    visible: self.visible[kind.index()],
                    features: layer.features.len(),
                    skipped: layer.skipped,
                    drawn: self.registry.count(kind),
                }
            })
            .collect()
    }

    // ---- lifecycle ----

    /// Close the store so in-flight loads are dropped, and remove every drawn shape.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.store.close();
        self.highlight.forget();
        self.selection.clear();
        for (_, d) in self.registry.drain() {
            self.renderer.remove(d.shape);
        }
        self.torn_down = true;
        info!("engine torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
