//! Atlas render: the drawing surface the engine talks to, plus two backends.
//!
//! The engine only ever speaks [`MapRenderer`]; any surface that can draw points and
//! polygons, restyle or remove them, show a popup and move its viewport is substitutable.

#![forbid(unsafe_code)]

use atlas_core::{Bounds, Feature, FeatureKey, Geometry, LatLng, Ring};
use serde::Serialize;

pub mod recorder;
pub mod style;
pub mod svg;

pub use recorder::{RecordingRenderer, RenderCall};
pub use style::Style;
pub use svg::SvgRenderer;

pub const MAX_ZOOM: f64 = 20.0;
/// Tile edge in pixels used by zoom arithmetic.
const TILE_PX: f64 = 256.0;

/// Opaque id of a drawn shape, issued by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShapeHandle(pub u64);

/// Popup body: a title, labelled rows and an optional footnote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Popup {
    pub title: String,
    pub rows: Vec<(String, String)>,
    pub note: Option<String>,
}

/// Where the camera should go.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ViewportTarget {
    Point(LatLng),
    Bounds(Bounds),
}

impl ViewportTarget {
    pub fn of(geometry: &Geometry) -> Option<Self> {
        match geometry {
            Geometry::Point(p) => Some(ViewportTarget::Point(*p)),
            Geometry::Polygon(_) => geometry.bounds().map(ViewportTarget::Bounds),
        }
    }

    pub fn center(&self) -> LatLng {
        match self {
            ViewportTarget::Point(p) => *p,
            ViewportTarget::Bounds(b) => b.center(),
        }
    }
}

pub trait MapRenderer {
    /// Draw a marker. Clicking it reports `click` back to the engine.
    fn draw_point(&mut self, at: LatLng, style: &Style, click: &FeatureKey) -> ShapeHandle;

    fn draw_polygon(&mut self, rings: &[Ring], style: &Style, click: &FeatureKey) -> ShapeHandle;

    fn set_style(&mut self, shape: ShapeHandle, style: &Style);

    fn remove(&mut self, shape: ShapeHandle);

    fn open_popup(&mut self, feature: &FeatureKey, anchor: LatLng, popup: &Popup);

    fn set_viewport(&mut self, center: LatLng, zoom: f64);

    /// Show `bounds` entirely, never zooming in past `max_zoom`.
    fn fit_bounds(&mut self, bounds: Bounds, max_zoom: Option<f64>);

    fn zoom(&self) -> f64;
}

/// Draw a feature with whichever primitive its geometry needs.
pub fn draw_feature<R: MapRenderer + ?Sized>(renderer: &mut R, feature: &Feature, style: &Style) -> ShapeHandle {
    let key = feature.key();
    match &feature.geometry {
        Geometry::Point(p) => renderer.draw_point(*p, style, &key),
        Geometry::Polygon(rings) => renderer.draw_polygon(rings, style, &key),
    }
}

/// Largest zoom at which `bounds` fits a `width` x `height` pixel viewport.
pub fn fit_zoom(bounds: &Bounds, width: f64, height: f64) -> f64 {
    let lng_span = bounds.width().abs();
    let lat_span = bounds.height().abs();
    if lng_span <= f64::EPSILON && lat_span <= f64::EPSILON {
        return MAX_ZOOM;
    }
    let zx = if lng_span > f64::EPSILON { (width * 360.0 / (TILE_PX * lng_span)).log2() } else { MAX_ZOOM };
    let zy = if lat_span > f64::EPSILON { (height * 180.0 / (TILE_PX * lat_span)).log2() } else { MAX_ZOOM };
    zx.min(zy).clamp(0.0, MAX_ZOOM)
}

/// Pixels per degree at a zoom level.
pub fn px_per_degree(zoom: f64) -> f64 {
    TILE_PX * 2f64.powf(zoom) / 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_zoom_shrinks_with_span() {
        let small = Bounds { south: 17.0, west: 79.0, north: 17.01, east: 79.01 };
        let large = Bounds { south: 10.0, west: 70.0, north: 30.0, east: 90.0 };
        let zs = fit_zoom(&small, 800.0, 500.0);
        let zl = fit_zoom(&large, 800.0, 500.0);
        assert!(zs > zl);
        assert!(zl > 0.0);
        assert_eq!(fit_zoom(&Bounds::from_point(LatLng::new(1.0, 1.0)), 800.0, 500.0), MAX_ZOOM);
    }

    #[test]
    fn viewport_target_follows_geometry() {
        let p = LatLng::new(20.0, 85.0);
        assert_eq!(ViewportTarget::of(&Geometry::Point(p)), Some(ViewportTarget::Point(p)));
        let poly = Geometry::Polygon(smallvec_ring(&[(1.0, 1.0), (3.0, 5.0)]));
        match ViewportTarget::of(&poly) {
            Some(ViewportTarget::Bounds(b)) => assert_eq!(b.center(), LatLng::new(2.0, 3.0)),
            other => panic!("unexpected target {:?}", other),
        }
    }

    fn smallvec_ring(pts: &[(f64, f64)]) -> smallvec::SmallVec<[Ring; 1]> {
        let ring: Ring = pts.iter().map(|(lat, lng)| LatLng::new(*lat, *lng)).collect();
        let mut v = smallvec::SmallVec::new();
        v.push(ring);
        v
    }
}
