//! Exclusive highlight of one feature found by an exact identifier match.

use atlas_core::{Feature, FeatureKey, FeatureKind};
use atlas_render::{style, MapRenderer, Style};
use tracing::debug;

use crate::popup::popup_for;
use crate::registry::RenderRegistry;

#[derive(Debug, Clone)]
struct Active {
    key: FeatureKey,
    original: Style,
}

#[derive(Debug)]
pub struct HighlightController {
    layer: FeatureKind,
    property: String,
    max_zoom: f64,
    active: Option<Active>,
}

impl HighlightController {
    pub fn new(layer: FeatureKind, property: impl Into<String>, max_zoom: f64) -> Self {
        Self { layer, property: property.into(), max_zoom, active: None }
    }

    pub fn layer(&self) -> FeatureKind {
        self.layer
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn active(&self) -> Option<&FeatureKey> {
        self.active.as_ref().map(|a| &a.key)
    }

    pub fn is_active(&self, key: &FeatureKey) -> bool {
        self.active().map(|k| k == key).unwrap_or(false)
    }

    /// Case-sensitive, whole-value match on the identifier property.
    pub fn find<'a>(&self, features: &'a [Feature], identifier: &str) -> Option<&'a Feature> {
        features
            .iter()
            .find(|f| f.prop(&self.property).map(|v| v.to_string() == identifier).unwrap_or(false))
    }

    /// Emphasise `feature`, restoring any other active highlight first, then fit the
    /// viewport to it (clamped to the max zoom) and open its popup.
    pub fn apply<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R, registry: &mut RenderRegistry, feature: &Feature) {
        let key = feature.key();
        if !self.is_active(&key) {
            self.clear(renderer, registry);
            let original = registry.get(&key).map(|d| d.style.clone()).unwrap_or_else(|| style::default_style(feature));
            registry.restyle(renderer, &key, &style::highlight_for(feature));
            debug!(feature = %key, "highlight applied");
            self.active = Some(Active { key: key.clone(), original });
        }
        if let Some(bounds) = feature.bounds() {
            renderer.fit_bounds(bounds, Some(self.max_zoom));
            renderer.open_popup(&key, bounds.center(), &popup_for(feature));
        }
    }

    /// Restore the original style and release the highlight. No-op when nothing is active.
    pub fn clear<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R, registry: &mut RenderRegistry) -> bool {
        match self.active.take() {
            Some(a) => {
                registry.restyle(renderer, &a.key, &a.original);
                debug!(feature = %a.key, "highlight cleared");
                true
            }
            None => false,
        }
    }

    /// Re-derive the style to restore from a reloaded copy of the active feature.
    pub fn rebase(&mut self, feature: &Feature) {
        if let Some(active) = self.active.as_mut().filter(|a| a.key == feature.key()) {
            active.original = style::default_style(feature);
        }
    }

    /// Release without restyling; used when the feature itself went away.
    pub fn forget(&mut self) {
        self.active = None;
    }

    /// Style to draw `feature` with, honouring an active highlight.
    pub fn style_for(&self, feature: &Feature) -> Style {
        if self.is_active(&feature.key()) {
            style::highlight_for(feature)
        } else {
            style::default_style(feature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::{FeatureId, Geometry, LatLng, PropValue, Properties, Ring};
    use atlas_render::{draw_feature, RecordingRenderer};
    use smallvec::smallvec;

    fn survey(id: &str, no: PropValue) -> Feature {
        let mut p = Properties::new();
        p.insert("SURVEY_NO".into(), no);
        let ring: Ring = vec![LatLng::new(17.0, 79.0), LatLng::new(17.0, 79.001), LatLng::new(17.001, 79.001)];
        Feature { id: FeatureId::from(id), kind: FeatureKind::Villages, geometry: Geometry::Polygon(smallvec![ring]), properties: p }
    }

    #[test]
    fn exact_match_only() {
        let hl = HighlightController::new(FeatureKind::Villages, "SURVEY_NO", 16.0);
        let features = vec![survey("a", PropValue::Text("SR-10".into())), survey("b", PropValue::Number(101.0))];
        assert_eq!(hl.find(&features, "SR-10").map(|f| f.id.as_str()), Some("a"));
        assert_eq!(hl.find(&features, "101").map(|f| f.id.as_str()), Some("b"));
        assert!(hl.find(&features, "SR-1").is_none());
        assert!(hl.find(&features, "sr-10").is_none());
    }

    #[test]
    fn switching_restores_the_previous_feature() {
        let mut r = RecordingRenderer::new();
        let mut reg = RenderRegistry::new();
        let mut hl = HighlightController::new(FeatureKind::Villages, "SURVEY_NO", 16.0);
        let a = survey("a", PropValue::Text("1".into()));
        let b = survey("b", PropValue::Text("2".into()));
        for f in [&a, &b] {
            let s = style::default_style(f);
            let h = draw_feature(&mut r, f, &s);
            reg.insert(f.key(), h, s);
        }
        let base = style::default_style(&a);

        hl.apply(&mut r, &mut reg, &a);
        assert_eq!(r.style_of(&a.key()), Some(&style::highlight_for(&a)));
        assert!(r.zoom() <= 16.0);

        hl.apply(&mut r, &mut reg, &b);
        assert_eq!(r.style_of(&a.key()), Some(&base));
        assert_eq!(r.style_of(&b.key()), Some(&style::highlight_for(&b)));

        assert!(hl.clear(&mut r, &mut reg));
        assert!(!hl.clear(&mut r, &mut reg));
        assert_eq!(r.style_of(&b.key()), Some(&base));
    }
}
