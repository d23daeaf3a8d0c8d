//! Atlas filter: cascading state → district → village selection over claims.
//!
//! The whole selection is one [`FilterState`] value changed only through
//! [`FilterState::reduce`], so a parent change and the reset of its children land together.

#![forbid(unsafe_code)]

use atlas_core::{props, ClaimStatus, Feature, FeatureKind};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod summary;

pub use summary::ClaimSummary;

/// Current selection. `None` means "All"; an empty search matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub state: Option<String>,
    pub district: Option<String>,
    pub village: Option<String>,
    pub status: Option<ClaimStatus>,
    pub search_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    SetSearch(String),
    SetState(Option<String>),
    SetDistrict(Option<String>),
    SetVillage(Option<String>),
    SetStatus(Option<ClaimStatus>),
    Reset,
}

/// Values currently offered by each dropdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub states: Vec<String>,
    pub districts: Vec<String>,
    pub villages: Vec<String>,
    pub statuses: Vec<ClaimStatus>,
}

/// Normalise a dropdown value: blank and "All" mean no constraint.
fn choice(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
}

fn matches(selected: &Option<String>, value: Option<&str>) -> bool {
    match selected {
        None => true,
        Some(want) => value.map(str::trim) == Some(want.as_str()),
    }
}

fn claims(features: &[Feature]) -> impl Iterator<Item = &Feature> {
    features.iter().filter(|f| f.kind == FeatureKind::Claims)
}

impl FilterState {
    pub fn is_default(&self) -> bool {
        *self == FilterState::default()
    }

    /// Single transition function. A parent change resets every descendant, and a child
    /// value the current parent does not offer is corrected to All rather than rejected.
    pub fn reduce(&self, action: FilterAction, features: &[Feature]) -> FilterState {
        let mut next = self.clone();
        match action {
            FilterAction::SetSearch(text) => next.search_text = text,
            FilterAction::SetStatus(status) => next.status = status,
            FilterAction::Reset => next = FilterState::default(),
            FilterAction::SetState(v) => {
                let v = choice(v);
                if v != self.state {
                    next.state = v;
                    next.district = None;
                    next.village = None;
                    if let Some(s) = &next.state {
                        if !compute_options(features, &next).states.contains(s) {
                            debug!(state = %s, "unknown state; resetting to All");
                            next.state = None;
                        }
                    }
                }
            }
            FilterAction::SetDistrict(v) => {
                let v = choice(v);
                if v != self.district {
                    next.district = None;
                    next.village = None;
                    if let Some(d) = v {
                        if compute_options(features, &next).districts.contains(&d) {
                            next.district = Some(d);
                        } else {
                            debug!(district = %d, state = ?next.state, "district not under current state; resetting to All");
                        }
                    }
                }
            }
            FilterAction::SetVillage(v) => {
                let v = choice(v);
                if v != self.village {
                    next.village = None;
                    if let Some(vil) = v {
                        if compute_options(features, &next).villages.contains(&vil) {
                            next.village = Some(vil);
                        } else {
                            debug!(village = %vil, district = ?next.district, "village not under current district; resetting to All");
                        }
                    }
                }
            }
        }
        next
    }

    /// Re-validate against a (re)loaded store: any level whose value disappeared resets
    /// itself and everything below it.
    pub fn reconcile(&self, features: &[Feature]) -> FilterState {
        let mut next = self.clone();
        let opts = compute_options(features, &FilterState { district: None, village: None, ..next.clone() });
        if let Some(s) = &next.state {
            if !opts.states.contains(s) {
                next.state = None;
                next.district = None;
                next.village = None;
            }
        }
        let opts = compute_options(features, &FilterState { village: None, ..next.clone() });
        if let Some(d) = &next.district {
            if !opts.districts.contains(d) {
                next.district = None;
                next.village = None;
            }
        }
        let opts = compute_options(features, &next);
        if let Some(v) = &next.village {
            if !opts.villages.contains(v) {
                next.village = None;
            }
        }
        if next != *self {
            debug!(before = ?self, after = ?next, "filters reconciled after reload");
        }
        next
    }
}

fn push_unique(out: &mut Vec<String>, seen: &mut FxHashSet<String>, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        if seen.insert(v.to_string()) {
            out.push(v.to_string());
        }
    }
}

/// Derive dropdown values. States come from every claim; districts only from claims in the
/// selected state; villages only from claims in the selected state and district.
/// Values keep first-seen store order.
pub fn compute_options(features: &[Feature], filters: &FilterState) -> FilterOptions {
    let mut out = FilterOptions::default();
    let (mut seen_s, mut seen_d, mut seen_v) = (FxHashSet::default(), FxHashSet::default(), FxHashSet::default());
    let mut statuses = [false; 3];
    for f in claims(features) {
        push_unique(&mut out.states, &mut seen_s, f.text_lossy(props::STATE).as_deref());
        if !matches(&filters.state, f.text_lossy(props::STATE).as_deref()) {
            continue;
        }
        push_unique(&mut out.districts, &mut seen_d, f.text_lossy(props::DISTRICT).as_deref());
        if !matches(&filters.district, f.text_lossy(props::DISTRICT).as_deref()) {
            continue;
        }
        push_unique(&mut out.villages, &mut seen_v, f.text_lossy(props::VILLAGE).as_deref());
        if !matches(&filters.village, f.text_lossy(props::VILLAGE).as_deref()) {
            continue;
        }
        if let Some(s) = f.status() {
            statuses[s as usize] = true;
        }
    }
    out.statuses = ClaimStatus::ALL.into_iter().filter(|s| statuses[*s as usize]).collect();
    out
}

fn search_hit(f: &Feature, needle: &str) -> bool {
    [props::NAME, props::PATTA_NUMBER, props::VILLAGE]
        .iter()
        .any(|k| f.text_lossy(k).map(|v| v.to_lowercase().contains(needle)).unwrap_or(false))
}

/// Claims satisfying every active predicate, in store order. Empty is a valid answer.
pub fn apply_filters<'a>(features: &'a [Feature], filters: &FilterState) -> Vec<&'a Feature> {
    let needle = filters.search_text.trim().to_lowercase();
    claims(features)
        .filter(|f| needle.is_empty() || search_hit(f, &needle))
        .filter(|f| filters.status.map(|s| f.status() == Some(s)).unwrap_or(true))
        .filter(|f| matches(&filters.state, f.text_lossy(props::STATE).as_deref()))
        .filter(|f| matches(&filters.district, f.text_lossy(props::DISTRICT).as_deref()))
        .filter(|f| matches(&filters.village, f.text_lossy(props::VILLAGE).as_deref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::{FeatureId, Geometry, LatLng, PropValue};

    fn claim(id: &str, state: &str, district: &str, village: &str, status: &str) -> Feature {
        let mut properties = atlas_core::Properties::new();
        for (k, v) in [
            (props::NAME, id),
            (props::PATTA_NUMBER, &format!("P-{}", id)[..]),
            (props::STATE, state),
            (props::DISTRICT, district),
            (props::VILLAGE, village),
            (props::STATUS, status),
        ] {
            properties.insert(k.to_string(), PropValue::Text(v.to_string()));
        }
        Feature {
            id: FeatureId::from(id),
            kind: FeatureKind::Claims,
            geometry: Geometry::Point(LatLng::new(20.0, 85.0)),
            properties,
        }
    }

    #[test]
    fn blank_and_all_are_no_constraint() {
        assert_eq!(choice(Some("All".into())), None);
        assert_eq!(choice(Some("  ".into())), None);
        assert_eq!(choice(Some(" Koraput ".into())), Some("Koraput".into()));
    }

    #[test]
    fn options_skip_missing_values_and_keep_first_seen_order() {
        let mut f = claim("x", "Odisha", "", "", "Pending");
        f.properties.remove(props::DISTRICT);
        let store = vec![claim("a", "MP", "Mandla", "V1", "Granted"), f, claim("b", "Odisha", "Koraput", "V2", "Pending")];
        let opts = compute_options(&store, &FilterState::default());
        assert_eq!(opts.states, vec!["MP", "Odisha"]);
        assert_eq!(opts.districts, vec!["Mandla", "Koraput"]);
        assert_eq!(opts.villages, vec!["V1", "V2"]);
        assert_eq!(opts.statuses, vec![ClaimStatus::Pending, ClaimStatus::Granted]);
    }

    #[test]
    fn same_parent_value_keeps_children() {
        let store = vec![claim("a", "Odisha", "Koraput", "V1", "Pending")];
        let f = FilterState::default()
            .reduce(FilterAction::SetState(Some("Odisha".into())), &store)
            .reduce(FilterAction::SetDistrict(Some("Koraput".into())), &store);
        let again = f.reduce(FilterAction::SetState(Some("Odisha".into())), &store);
        assert_eq!(again.district.as_deref(), Some("Koraput"));
    }

    #[test]
    fn numeric_values_search_and_cascade_like_text() {
        let mut a = claim("a", "Odisha", "Koraput", "V1", "Pending");
        a.properties.insert(props::PATTA_NUMBER.into(), PropValue::Number(12345.0));
        a.properties.insert(props::DISTRICT.into(), PropValue::Number(7.0));
        let store = vec![a, claim("b", "Odisha", "Rayagada", "V2", "Pending")];

        let hits = apply_filters(&store, &FilterState { search_text: "2345".into(), ..FilterState::default() });
        assert_eq!(hits.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(), vec!["a"]);

        let opts = compute_options(&store, &FilterState::default());
        assert_eq!(opts.districts, vec!["7", "Rayagada"]);
        let f = FilterState::default().reduce(FilterAction::SetDistrict(Some("7".into())), &store);
        assert_eq!(f.district.as_deref(), Some("7"));
        assert_eq!(compute_options(&store, &f).villages, vec!["V1"]);
        assert_eq!(apply_filters(&store, &f).len(), 1);
    }
}
