//! Selection & viewport focus.
//!
//! `Idle -> Selected(key) -> Idle`. Moving from one selection to another never passes
//! through `Idle`. Focus (viewport move plus popup) is applied as soon as the selected
//! feature has a drawn shape; until then it stays pending.

use atlas_core::{Feature, FeatureKey};
use atlas_render::{MapRenderer, ViewportTarget};
use serde::Serialize;
use tracing::debug;

use crate::popup::popup_for;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Selection {
    Idle,
    Selected { key: FeatureKey, pending_focus: bool },
}

#[derive(Debug)]
pub struct SelectionController {
    current: Selection,
    point_focus_zoom: f64,
}

impl SelectionController {
    pub fn new(point_focus_zoom: f64) -> Self {
        Self { current: Selection::Idle, point_focus_zoom }
    }

    pub fn state(&self) -> &Selection {
        &self.current
    }

    pub fn current(&self) -> Option<&FeatureKey> {
        match &self.current {
            Selection::Selected { key, .. } => Some(key),
            Selection::Idle => None,
        }
    }

    pub fn pending_focus(&self) -> bool {
        matches!(self.current, Selection::Selected { pending_focus: true, .. })
    }

    /// Enter `Selected(key)` with focus owed.
    pub fn select(&mut self, key: FeatureKey) {
        debug!(feature = %key, "selected");
        self.current = Selection::Selected { key, pending_focus: true };
    }

    pub fn clear(&mut self) {
        if let Selection::Selected { key, .. } = &self.current {
            debug!(feature = %key, "selection cleared");
        }
        self.current = Selection::Idle;
    }

    /// Settle owed focus on `feature` if it is the current selection and is drawn.
    pub fn settle<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R, feature: &Feature, drawn: bool) -> bool {
        let Selection::Selected { key, pending_focus } = &mut self.current else {
            return false;
        };
        if !*pending_focus || *key != feature.key() || !drawn {
            return false;
        }
        *pending_focus = false;
        focus(renderer, feature, self.point_focus_zoom);
        true
    }
}

/// Move the viewport onto `feature` and open its popup.
pub fn focus<R: MapRenderer + ?Sized>(renderer: &mut R, feature: &Feature, point_zoom: f64) {
    let Some(target) = ViewportTarget::of(&feature.geometry) else {
        debug!(feature = %feature.key(), "no geometry to focus");
        return;
    };
    match target {
        ViewportTarget::Point(p) => {
            let zoom = renderer.zoom().max(point_zoom);
            renderer.set_viewport(p, zoom);
        }
        ViewportTarget::Bounds(b) => renderer.fit_bounds(b, None),
    }
    renderer.open_popup(&feature.key(), target.center(), &popup_for(feature));
}
