#![forbid(unsafe_code)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use atlas_core::FeatureKind;
use atlas_store::{
    spawn_load_all, FeatureStore, FileSource, LayerLoader, LayerOutcome, LayerSource, LoadError, LoadState,
    StaticSource,
};

const CLAIMS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        { "type": "Feature", "id": "A",
          "geometry": { "type": "Point", "coordinates": [85.8, 20.3] },
          "properties": { "name": "A", "patta_no": "P-1", "status": "Pending", "state": "Odisha" } },
        { "type": "Feature", "id": "B",
          "geometry": { "type": "Point", "coordinates": [85.9, 20.4] },
          "properties": { "name": "B", "patta_no": "P-2", "status": "Granted", "state": "Odisha" } }
    ]
}"#;

const ASSETS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        { "type": "Feature", "id": "pond-1",
          "geometry": { "type": "Point", "coordinates": [85.7, 20.1] },
          "properties": { "name": "Pond", "type": "pond" } }
    ]
}"#;

/// Waits before answering; used to finish after teardown or to trip the timeout.
struct SlowSource {
    delay: Duration,
    text: &'static str,
}

#[async_trait::async_trait]
impl LayerSource for SlowSource {
    fn describe(&self) -> String {
        format!("slow({:?})", self.delay)
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.text.to_string())
    }
}

struct BrokenSource;

#[async_trait::async_trait]
impl LayerSource for BrokenSource {
    fn describe(&self) -> String {
        "broken".into()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        Err(LoadError::Source("connection refused".into()))
    }
}

#[tokio::test]
async fn failed_layer_does_not_block_siblings() {
    let store = Arc::new(FeatureStore::new());
    let loader = LayerLoader::new(Arc::clone(&store))
        .with_source(FeatureKind::Claims, StaticSource::new(CLAIMS))
        .with_source(FeatureKind::Villages, BrokenSource)
        .with_source(FeatureKind::Assets, StaticSource::new(ASSETS));
    let report = loader.load_all().await;

    assert!(report.loaded(FeatureKind::Claims));
    assert!(report.loaded(FeatureKind::Assets));
    assert!(!report.loaded(FeatureKind::Villages));
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, FeatureKind::Villages);
    assert!(failures[0].1.contains("connection refused"));
    assert_eq!(report.get(FeatureKind::AdminBoundaries).map(|r| &r.outcome), Some(&LayerOutcome::NotConfigured));

    assert_eq!(store.layer(FeatureKind::Claims).features.len(), 2);
    assert!(matches!(store.state(FeatureKind::Villages), LoadState::Failed(_)));
    assert!(store.layer(FeatureKind::Villages).features.is_empty());
    assert_eq!(store.state(FeatureKind::AdminBoundaries), LoadState::NotLoaded);
}

#[tokio::test]
async fn completion_order_does_not_change_final_state() {
    async fn run(claims_delay: u64, assets_delay: u64) -> (Vec<String>, Vec<String>) {
        let store = Arc::new(FeatureStore::new());
        let loader = LayerLoader::new(Arc::clone(&store))
            .with_source(FeatureKind::Claims, SlowSource { delay: Duration::from_millis(claims_delay), text: CLAIMS })
            .with_source(FeatureKind::Assets, SlowSource { delay: Duration::from_millis(assets_delay), text: ASSETS });
        loader.load_all().await;
        let ids = |k| store.layer(k).features.iter().map(|f| f.id.to_string()).collect::<Vec<_>>();
        (ids(FeatureKind::Claims), ids(FeatureKind::Assets))
    }
    let first = run(5, 30).await;
    let second = run(30, 5).await;
    assert_eq!(first, second);
    assert_eq!(first.0, vec!["A", "B"]);
}

#[tokio::test]
async fn late_completion_after_teardown_is_dropped() {
    let store = Arc::new(FeatureStore::new());
    let loader = LayerLoader::new(Arc::clone(&store))
        .with_source(FeatureKind::Claims, SlowSource { delay: Duration::from_millis(50), text: CLAIMS });
    let handle = spawn_load_all(loader);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.state(FeatureKind::Claims), LoadState::Loading);
    store.close();

    let report = handle.await.unwrap();
    assert_eq!(report.get(FeatureKind::Claims).map(|r| &r.outcome), Some(&LayerOutcome::Discarded));
    assert!(store.layer(FeatureKind::Claims).features.is_empty());
    assert_eq!(store.state(FeatureKind::Claims), LoadState::Loading);
}

#[tokio::test]
async fn hung_fetch_resolves_to_failed() {
    let store = Arc::new(FeatureStore::new());
    let loader = LayerLoader::new(Arc::clone(&store))
        .with_timeout(Duration::from_millis(20))
        .with_source(FeatureKind::Assets, SlowSource { delay: Duration::from_secs(30), text: ASSETS });
    let report = loader.load_all().await;
    match &report.get(FeatureKind::Assets).unwrap().outcome {
        LayerOutcome::Failed { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(matches!(store.state(FeatureKind::Assets), LoadState::Failed(_)));
}

#[tokio::test]
async fn file_sources_and_reload() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ASSETS.as_bytes()).unwrap();
    let store = Arc::new(FeatureStore::new());
    let loader = LayerLoader::new(Arc::clone(&store))
        .with_source(FeatureKind::Assets, FileSource::new(file.path()))
        .with_source(FeatureKind::Villages, FileSource::new("/definitely/not/here.geojson"));

    let report = loader.load_all().await;
    assert!(report.loaded(FeatureKind::Assets));
    assert!(matches!(store.state(FeatureKind::Villages), LoadState::Failed(_)));
    let epoch = store.epoch();

    // manual reload of one layer
    let again = loader.load_layer(FeatureKind::Assets).await;
    assert_eq!(again.outcome, LayerOutcome::Loaded { features: 1, skipped: 0 });
    assert!(store.epoch() > epoch);
}
