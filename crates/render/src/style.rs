//! Shape styles and the default palette per layer.

use atlas_core::{props, ClaimStatus, Feature, FeatureKind, Geometry};
use serde::Serialize;

/// Visual attributes of one drawn shape. Colours are CSS hex strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    pub stroke: String,
    pub stroke_opacity: f32,
    pub stroke_weight: f32,
    /// `None` draws an unfilled outline.
    pub fill: Option<String>,
    pub fill_opacity: f32,
    /// Marker radius in pixels; ignored for polygons.
    pub radius: f32,
}

impl Style {
    fn marker(fill: &str, radius: f32, fill_opacity: f32) -> Self {
        Style {
            stroke: "#ffffff".into(),
            stroke_opacity: 1.0,
            stroke_weight: 2.0,
            fill: Some(fill.into()),
            fill_opacity,
            radius,
        }
    }

    fn area(stroke: &str, stroke_opacity: f32, stroke_weight: f32, fill: Option<&str>, fill_opacity: f32) -> Self {
        Style {
            stroke: stroke.into(),
            stroke_opacity,
            stroke_weight,
            fill: fill.map(Into::into),
            fill_opacity,
            radius: 0.0,
        }
    }
}

pub const FALLBACK: &str = "#64748b";

pub fn status_color(status: Option<ClaimStatus>) -> &'static str {
    match status {
        Some(ClaimStatus::Granted) => "#10b981",
        Some(ClaimStatus::Pending) => "#f59e0b",
        Some(ClaimStatus::Rejected) | None => FALLBACK,
    }
}

/// Claim markers are coloured by claim type (IFR/CFR/CR) when one is recorded, by status otherwise.
pub fn claim_color(feature: &Feature) -> &'static str {
    match feature.text(props::CLAIM_TYPE).map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("IFR") => "#3b82f6",
        Some(t) if t.eq_ignore_ascii_case("CFR") => "#10b981",
        Some(t) if t.eq_ignore_ascii_case("CR") => "#f59e0b",
        Some(_) => FALLBACK,
        None => status_color(feature.status()),
    }
}

fn asset_color(feature: &Feature) -> &'static str {
    match feature.text(props::ASSET_TYPE) {
        Some(t) if t.eq_ignore_ascii_case("pond") => "#06b6d4",
        _ => "#059669",
    }
}

/// Mandal boundaries carry a mandal name; everything else in the admin layer is a district.
fn is_mandal(feature: &Feature) -> bool {
    feature.properties.keys().any(|k| k.eq_ignore_ascii_case("mandal") || k.eq_ignore_ascii_case("mandal_n"))
}

pub fn default_style(feature: &Feature) -> Style {
    match feature.kind {
        FeatureKind::Claims => Style::marker(claim_color(feature), 8.0, 0.8),
        FeatureKind::Assets => Style::marker(asset_color(feature), 6.0, 0.7),
        FeatureKind::Villages => Style::area("#666666", 0.6, 1.0, Some("#999999"), 0.2),
        FeatureKind::AdminBoundaries if is_mandal(feature) => {
            Style::area("#0066CC", 0.8, 2.0, Some("#0066CC"), 0.1)
        }
        FeatureKind::AdminBoundaries => Style::area("#000000", 1.0, 3.0, None, 0.0),
    }
}

/// Emphasis for polygons.
pub fn highlight() -> Style {
    Style::area("#FF0000", 1.0, 4.0, Some("#FF0000"), 0.3)
}

/// Emphasis for `feature`. Points stay markers, drawn a little larger than their default.
pub fn highlight_for(feature: &Feature) -> Style {
    match feature.geometry {
        Geometry::Point(_) => Style {
            stroke: "#FF0000".into(),
            stroke_weight: 4.0,
            radius: default_style(feature).radius + 4.0,
            ..Style::marker("#FF0000", 0.0, 0.8)
        },
        Geometry::Polygon(_) => highlight(),
    }
}
