//! In-memory renderer that records every call. Used as the test double and for dry runs.

use std::collections::BTreeMap;

use atlas_core::{Bounds, FeatureKey, LatLng};
use serde::Serialize;

use crate::{fit_zoom, MapRenderer, Popup, ShapeHandle, Style, MAX_ZOOM};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RenderCall {
    DrawPoint { shape: ShapeHandle, key: FeatureKey },
    DrawPolygon { shape: ShapeHandle, key: FeatureKey, rings: usize },
    SetStyle { shape: ShapeHandle, style: Style },
    Remove { shape: ShapeHandle },
    OpenPopup { key: FeatureKey, anchor: LatLng, popup: Popup },
    SetViewport { center: LatLng, zoom: f64 },
    FitBounds { bounds: Bounds, max_zoom: Option<f64> },
}

#[derive(Debug, Clone)]
pub struct LiveShape {
    pub key: FeatureKey,
    pub style: Style,
}

#[derive(Debug)]
pub struct RecordingRenderer {
    next: u64,
    shapes: BTreeMap<ShapeHandle, LiveShape>,
    calls: Vec<RenderCall>,
    center: LatLng,
    zoom: f64,
    width: f64,
    height: f64,
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self {
            next: 1,
            shapes: BTreeMap::new(),
            calls: Vec::new(),
            center: LatLng::new(20.5937, 78.9629),
            zoom: 5.0,
            width: 800.0,
            height: 600.0,
        }
    }

    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    /// Drop the call log; live shapes and the viewport are kept.
    pub fn take_calls(&mut self) -> Vec<RenderCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn live(&self) -> impl Iterator<Item = (&ShapeHandle, &LiveShape)> {
        self.shapes.iter()
    }

    pub fn live_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn shape_for(&self, key: &FeatureKey) -> Option<ShapeHandle> {
        self.shapes.iter().find(|(_, s)| &s.key == key).map(|(h, _)| *h)
    }

    /// Current style of the live shape drawn for `key`.
    pub fn style_of(&self, key: &FeatureKey) -> Option<&Style> {
        self.shapes.values().find(|s| &s.key == key).map(|s| &s.style)
    }

    pub fn popups(&self) -> Vec<(&FeatureKey, &Popup)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::OpenPopup { key, popup, .. } => Some((key, popup)),
                _ => None,
            })
            .collect()
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    fn issue(&mut self, key: &FeatureKey, style: &Style) -> ShapeHandle {
        let shape = ShapeHandle(self.next);
        self.next += 1;
        self.shapes.insert(shape, LiveShape { key: key.clone(), style: style.clone() });
        shape
    }
}

impl MapRenderer for RecordingRenderer {
    fn draw_point(&mut self, _at: LatLng, style: &Style, click: &FeatureKey) -> ShapeHandle {
        let shape = self.issue(click, style);
        self.calls.push(RenderCall::DrawPoint { shape, key: click.clone() });
        shape
    }

    fn draw_polygon(&mut self, rings: &[atlas_core::Ring], style: &Style, click: &FeatureKey) -> ShapeHandle {
        let shape = self.issue(click, style);
        self.calls.push(RenderCall::DrawPolygon { shape, key: click.clone(), rings: rings.len() });
        shape
    }

    fn set_style(&mut self, shape: ShapeHandle, style: &Style) {
        if let Some(s) = self.shapes.get_mut(&shape) {
            s.style = style.clone();
        }
        self.calls.push(RenderCall::SetStyle { shape, style: style.clone() });
    }

    fn remove(&mut self, shape: ShapeHandle) {
        self.shapes.remove(&shape);
        self.calls.push(RenderCall::Remove { shape });
    }

    fn open_popup(&mut self, feature: &FeatureKey, anchor: LatLng, popup: &Popup) {
        self.calls.push(RenderCall::OpenPopup { key: feature.clone(), anchor, popup: popup.clone() });
    }

    fn set_viewport(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = zoom.clamp(0.0, MAX_ZOOM);
        self.calls.push(RenderCall::SetViewport { center, zoom });
    }

    fn fit_bounds(&mut self, bounds: Bounds, max_zoom: Option<f64>) {
        let fitted = fit_zoom(&bounds, self.width, self.height);
        self.center = bounds.center();
        self.zoom = max_zoom.map(|m| fitted.min(m)).unwrap_or(fitted);
        self.calls.push(RenderCall::FitBounds { bounds, max_zoom });
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }
}
