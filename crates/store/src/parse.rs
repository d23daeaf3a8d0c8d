//! GeoJSON FeatureCollection -> typed features.

use atlas_core::props::{self, NOT_FOUND};
use atlas_core::{ClaimStatus, Feature, FeatureId, FeatureKind, Geometry, LatLng, PropValue, Properties, Ring};
use geojson::feature::Id;
use geojson::GeoJson;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::LoadError;

#[derive(Debug, Clone, Default)]
pub struct ParsedLayer {
    pub features: Vec<Feature>,
    /// Records dropped because their geometry or attributes were unusable.
    pub skipped: usize,
}

/// Parse one layer document. Individual bad records are skipped; only a document
/// that is not a FeatureCollection at all fails the layer.
pub fn parse_layer(kind: FeatureKind, text: &str) -> Result<ParsedLayer, LoadError> {
    let doc: GeoJson = text.parse()?;
    let collection = match doc {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(LoadError::NotFeatureCollection),
    };

    let mut out = ParsedLayer { features: Vec::with_capacity(collection.features.len()), skipped: 0 };
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for (ordinal, raw) in collection.features.into_iter().enumerate() {
        let properties = props::canonicalize(kind, convert_properties(raw.properties.as_ref()));
        let id = feature_id(kind, raw.id.as_ref(), &properties, ordinal);
        let Some(geometry) = raw.geometry.as_ref().and_then(convert_geometry) else {
            debug!(layer = %kind, id = %id, "skipping feature without usable geometry");
            out.skipped += 1;
            continue;
        };
        if seen.contains(&id) {
            warn!(layer = %kind, id = %id, "duplicate feature id; keeping the first");
            out.skipped += 1;
            continue;
        }
        let feature = Feature { id: FeatureId(id), kind, geometry, properties };
        let feature = if kind == FeatureKind::Claims { validate_claim(feature) } else { Some(feature) };
        match feature {
            Some(f) => {
                seen.insert(f.id.as_str().to_string());
                out.features.push(f);
            }
            None => out.skipped += 1,
        }
    }
    if out.skipped > 0 {
        warn!(layer = %kind, kept = out.features.len(), skipped = out.skipped, "layer had unusable records");
    }
    Ok(out)
}

fn convert_properties(raw: Option<&geojson::JsonObject>) -> Properties {
    let mut out = Properties::new();
    if let Some(map) = raw {
        for (k, v) in map.iter() {
            if let Some(pv) = PropValue::from_json(v) {
                out.insert(k.clone(), pv);
            }
        }
    }
    out
}

fn feature_id(kind: FeatureKind, raw: Option<&Id>, properties: &Properties, ordinal: usize) -> String {
    match raw {
        Some(Id::String(s)) if !s.is_empty() => s.clone(),
        Some(Id::Number(n)) => n.to_string(),
        _ => match properties.get(props::ID) {
            Some(v) if !v.to_string().is_empty() => v.to_string(),
            _ => format!("{}-{}", kind, ordinal + 1),
        },
    }
}

fn convert_geometry(g: &geojson::Geometry) -> Option<Geometry> {
    match &g.value {
        geojson::Value::Point(pos) => LatLng::from_position(pos).filter(LatLng::is_valid).map(Geometry::Point),
        geojson::Value::Polygon(rings) => polygon(rings),
        // boundary files mix Polygon and MultiPolygon; the first part is the main one
        geojson::Value::MultiPolygon(parts) => parts.first().and_then(|rings| polygon(rings)),
        _ => None,
    }
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Option<Geometry> {
    let rings: SmallVec<[Ring; 1]> = rings
        .iter()
        .map(|ring| {
            ring.iter()
                .filter_map(|pos| LatLng::from_position(pos))
                .filter(LatLng::is_valid)
                .collect::<Ring>()
        })
        .filter(|ring| !ring.is_empty())
        .collect();
    if rings.is_empty() {
        None
    } else {
        Some(Geometry::Polygon(rings))
    }
}

/// Enforce the claim invariant: point geometry, a known status, and non-empty
/// name/patta number (filled with the not-found marker when absent).
fn validate_claim(mut f: Feature) -> Option<Feature> {
    if f.geometry.as_point().is_none() {
        warn!(id = %f.id, "claim geometry is not a point; skipping");
        return None;
    }
    let status = match f.text(props::STATUS).map(str::parse::<ClaimStatus>) {
        Some(Ok(s)) => s,
        Some(Err(e)) => {
            warn!(id = %f.id, error = %e, "skipping claim");
            return None;
        }
        None => {
            warn!(id = %f.id, "claim has no status; skipping");
            return None;
        }
    };
    f.properties.insert(props::STATUS.to_string(), PropValue::Text(status.as_str().to_string()));
    for key in [props::NAME, props::PATTA_NUMBER] {
        let present = f.prop(key).map(|v| !v.to_string().trim().is_empty()).unwrap_or(false);
        if !present {
            f.properties.insert(key.to_string(), PropValue::Text(NOT_FOUND.to_string()));
        }
    }
    Some(f)
}
