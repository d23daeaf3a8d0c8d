//! Identity-keyed map from features to the shapes drawn for them.

use atlas_core::{FeatureKey, FeatureKind};
use atlas_render::{MapRenderer, ShapeHandle, Style};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Drawn {
    pub shape: ShapeHandle,
    /// Style the shape currently wears.
    pub style: Style,
}

/// Lookups go through [`FeatureKey`], so filtering that reorders or shrinks the visible
/// list never points a handle at the wrong feature.
#[derive(Debug, Default)]
pub struct RenderRegistry {
    drawn: FxHashMap<FeatureKey, Drawn>,
}

impl RenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FeatureKey, shape: ShapeHandle, style: Style) -> Option<Drawn> {
        self.drawn.insert(key, Drawn { shape, style })
    }

    pub fn get(&self, key: &FeatureKey) -> Option<&Drawn> {
        self.drawn.get(key)
    }

    pub fn shape(&self, key: &FeatureKey) -> Option<ShapeHandle> {
        self.drawn.get(key).map(|d| d.shape)
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        self.drawn.contains_key(key)
    }

    pub fn remove(&mut self, key: &FeatureKey) -> Option<Drawn> {
        self.drawn.remove(key)
    }

    /// Restyle the shape drawn for `key`; false when nothing is drawn for it.
    pub fn restyle<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R, key: &FeatureKey, style: &Style) -> bool {
        match self.drawn.get_mut(key) {
            Some(d) => {
                d.style = style.clone();
                renderer.set_style(d.shape, style);
                true
            }
            None => false,
        }
    }

    pub fn keys_of(&self, kind: FeatureKind) -> Vec<FeatureKey> {
        self.drawn.keys().filter(|k| k.kind == kind).cloned().collect()
    }

    pub fn count(&self, kind: FeatureKind) -> usize {
        self.drawn.keys().filter(|k| k.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.drawn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty()
    }

    pub fn drain(&mut self) -> Vec<(FeatureKey, Drawn)> {
        self.drawn.drain().collect()
    }
}
