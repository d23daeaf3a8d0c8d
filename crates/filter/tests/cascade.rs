#![forbid(unsafe_code)]

use std::sync::Arc;

use atlas_core::{props, ClaimStatus, Feature, FeatureId, FeatureKind, Geometry, LatLng, PropValue, Properties};
use atlas_filter::{apply_filters, compute_options, FilterAction, FilterState};
use atlas_store::{FeatureStore, LayerLoader, LayerSource, LoadError, StaticSource};

fn claim(id: &str, name: &str, state: &str, district: &str, village: &str, status: ClaimStatus) -> Feature {
    let mut properties = Properties::new();
    for (k, v) in [
        (props::NAME, name),
        (props::PATTA_NUMBER, "P-0"),
        (props::STATE, state),
        (props::DISTRICT, district),
        (props::VILLAGE, village),
        (props::STATUS, status.as_str()),
    ] {
        properties.insert(k.to_string(), PropValue::Text(v.to_string()));
    }
    Feature { id: FeatureId::from(id), kind: FeatureKind::Claims, geometry: Geometry::Point(LatLng::new(20.0, 85.0)), properties }
}

fn ids(found: &[&Feature]) -> Vec<String> {
    found.iter().map(|f| f.id.to_string()).collect()
}

fn sample() -> Vec<Feature> {
    vec![
        claim("A", "Asha Devi", "Odisha", "Koraput", "Dumuriguda", ClaimStatus::Pending),
        claim("B", "Birsa B", "Odisha", "Rayagada", "Kolnara", ClaimStatus::Granted),
        claim("C", "Chaitu", "MP", "Mandla", "Bichhiya", ClaimStatus::Pending),
        claim("D", "Dhani", "Odisha", "Koraput", "Lamtaput", ClaimStatus::Rejected),
        claim("E", "Etwa", "MP", "Dindori", "Samnapur", ClaimStatus::Granted),
    ]
}

#[test]
fn three_claim_scenario() {
    let store = vec![
        claim("A", "Alpha", "Odisha", "Koraput", "V1", ClaimStatus::Pending),
        claim("B", "Bravo", "Odisha", "Koraput", "V2", ClaimStatus::Granted),
        claim("C", "Charlie", "MP", "Mandla", "V3", ClaimStatus::Pending),
    ];
    let odisha = FilterState { state: Some("Odisha".into()), ..Default::default() };
    assert_eq!(ids(&apply_filters(&store, &odisha)), vec!["A", "B"]);

    let odisha_pending = FilterState { status: Some(ClaimStatus::Pending), ..odisha.clone() };
    assert_eq!(ids(&apply_filters(&store, &odisha_pending)), vec!["A"]);

    let search_b = FilterState { search_text: "B".into(), ..Default::default() };
    assert_eq!(ids(&apply_filters(&store, &search_b)), vec!["B"]);
}

#[test]
fn results_are_an_ordered_subset_of_the_store() {
    let store = sample();
    let filters = [
        FilterState::default(),
        FilterState { status: Some(ClaimStatus::Granted), ..Default::default() },
        FilterState { state: Some("Odisha".into()), search_text: "a".into(), ..Default::default() },
        FilterState { state: Some("Nowhere".into()), ..Default::default() },
    ];
    for f in filters.iter() {
        let hits = apply_filters(&store, f);
        let positions: Vec<usize> =
            hits.iter().map(|h| store.iter().position(|s| s.id == h.id).expect("hit comes from the store")).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "order broken for {:?}", f);
    }
    assert_eq!(apply_filters(&store, &filters[0]).len(), store.len());
    assert!(apply_filters(&store, &filters[3]).is_empty());
}

#[test]
fn search_is_case_insensitive_across_name_patta_and_village() {
    let store = sample();
    let by_village = FilterState { search_text: "KOLNARA".into(), ..Default::default() };
    assert_eq!(ids(&apply_filters(&store, &by_village)), vec!["B"]);
    let by_patta = FilterState { search_text: "p-0".into(), ..Default::default() };
    assert_eq!(apply_filters(&store, &by_patta).len(), 5);
    let nothing = FilterState { search_text: "zzz".into(), ..Default::default() };
    assert!(apply_filters(&store, &nothing).is_empty());
}

#[test]
fn changing_state_resets_children_and_narrows_districts() {
    let store = sample();
    let f = FilterState::default()
        .reduce(FilterAction::SetState(Some("Odisha".into())), &store)
        .reduce(FilterAction::SetDistrict(Some("Koraput".into())), &store)
        .reduce(FilterAction::SetVillage(Some("Lamtaput".into())), &store);
    assert_eq!(f.village.as_deref(), Some("Lamtaput"));
    assert_eq!(ids(&apply_filters(&store, &f)), vec!["D"]);

    let moved = f.reduce(FilterAction::SetState(Some("MP".into())), &store);
    assert_eq!(moved.state.as_deref(), Some("MP"));
    assert_eq!(moved.district, None);
    assert_eq!(moved.village, None);
    let opts = compute_options(&store, &moved);
    assert_eq!(opts.districts, vec!["Mandla", "Dindori"]);
    assert_eq!(opts.states, vec!["Odisha", "MP"]);
}

#[test]
fn changing_district_resets_village() {
    let store = sample();
    let f = FilterState::default()
        .reduce(FilterAction::SetState(Some("Odisha".into())), &store)
        .reduce(FilterAction::SetDistrict(Some("Koraput".into())), &store)
        .reduce(FilterAction::SetVillage(Some("Dumuriguda".into())), &store)
        .reduce(FilterAction::SetDistrict(Some("Rayagada".into())), &store);
    assert_eq!(f.district.as_deref(), Some("Rayagada"));
    assert_eq!(f.village, None);
}

#[test]
fn villages_depend_on_state_and_district() {
    let store = sample();
    let koraput = FilterState { state: Some("Odisha".into()), district: Some("Koraput".into()), ..Default::default() };
    assert_eq!(compute_options(&store, &koraput).villages, vec!["Dumuriguda", "Lamtaput"]);
    let all = compute_options(&store, &FilterState::default());
    assert_eq!(all.villages.len(), 5);
}

#[test]
fn inconsistent_child_is_corrected_not_rejected() {
    let store = sample();
    let f = FilterState::default().reduce(FilterAction::SetState(Some("MP".into())), &store);
    let bad = f.reduce(FilterAction::SetDistrict(Some("Koraput".into())), &store);
    assert_eq!(bad.state.as_deref(), Some("MP"));
    assert_eq!(bad.district, None);

    let bad_village = f.reduce(FilterAction::SetVillage(Some("Kolnara".into())), &store);
    assert_eq!(bad_village.village, None);

    let unknown_state = FilterState::default().reduce(FilterAction::SetState(Some("Atlantis".into())), &store);
    assert_eq!(unknown_state.state, None);
}

#[test]
fn status_and_search_leave_location_alone() {
    let store = sample();
    let f = FilterState::default()
        .reduce(FilterAction::SetState(Some("Odisha".into())), &store)
        .reduce(FilterAction::SetDistrict(Some("Koraput".into())), &store)
        .reduce(FilterAction::SetStatus(Some(ClaimStatus::Pending)), &store)
        .reduce(FilterAction::SetSearch("asha".into()), &store);
    assert_eq!(f.district.as_deref(), Some("Koraput"));
    assert_eq!(ids(&apply_filters(&store, &f)), vec!["A"]);
    assert!(f.reduce(FilterAction::Reset, &store).is_default());
}

#[test]
fn reconcile_drops_values_missing_after_reload() {
    let store = sample();
    let f = FilterState {
        state: Some("Odisha".into()),
        district: Some("Koraput".into()),
        village: Some("Lamtaput".into()),
        ..Default::default()
    };
    let reloaded: Vec<Feature> = store.into_iter().filter(|c| c.id.as_str() != "D").collect();
    let r = f.reconcile(&reloaded);
    assert_eq!(r.state.as_deref(), Some("Odisha"));
    assert_eq!(r.district.as_deref(), Some("Koraput"));
    assert_eq!(r.village, None);
}

struct Unreachable;

#[async_trait::async_trait]
impl LayerSource for Unreachable {
    fn describe(&self) -> String {
        "unreachable".into()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        Err(LoadError::Source("503".into()))
    }
}

#[tokio::test]
async fn failed_village_layer_leaves_claim_filtering_intact() {
    let doc = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "id": "A", "geometry": { "type": "Point", "coordinates": [85.0, 20.0] },
              "properties": { "name": "A", "patta_no": "1", "status": "Pending", "state": "Odisha" } },
            { "type": "Feature", "id": "C", "geometry": { "type": "Point", "coordinates": [80.0, 22.0] },
              "properties": { "name": "C", "patta_no": "3", "status": "Pending", "state": "MP" } }
        ]
    });
    let store = Arc::new(FeatureStore::new());
    LayerLoader::new(Arc::clone(&store))
        .with_source(FeatureKind::Claims, StaticSource::new(doc.to_string()))
        .with_source(FeatureKind::Villages, Unreachable)
        .load_all()
        .await;
    let claims = store.layer(FeatureKind::Claims);
    let f = FilterState { state: Some("MP".into()), ..Default::default() };
    assert_eq!(ids(&apply_filters(&claims.features, &f)), vec!["C"]);
}
