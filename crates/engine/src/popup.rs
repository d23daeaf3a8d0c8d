use atlas_core::{columns, dss_suggestion, props, Feature, FeatureKind};
use atlas_render::Popup;

/// Detail popup for any feature. When the curated row list for its kind finds nothing,
/// every property is shown instead.
pub fn popup_for(feature: &Feature) -> Popup {
    let title = feature
        .text(props::NAME)
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", feature.kind.label(), feature.id));
    let mut rows: Vec<(String, String)> = columns::popup_columns_for(feature.kind)
        .iter()
        .filter_map(|c| feature.prop(c.key).map(|v| (c.label.to_string(), v.to_string())))
        .collect();
    if rows.is_empty() {
        rows = feature
            .properties
            .iter()
            .filter(|(k, _)| k.as_str() != props::NAME)
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
    }
    let note = match feature.kind {
        FeatureKind::Claims => Some(dss_suggestion(feature)).filter(|s| !s.is_empty()),
        _ => None,
    };
    Popup { title, rows, note }
}
