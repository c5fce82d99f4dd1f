//! Asset loading against the files shipped in `assets/`.

use cgmath::Vector3;
use futures::channel::mpsc;
use orbit_viewer::{
    config::{AssetConfig, ViewerConfig},
    resources::loader::{LoadEvent, Tracker, fetch_model, load_assets},
};

fn drain(rx: &mut mpsc::UnboundedReceiver<LoadEvent>) -> Vec<LoadEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = rx.try_next() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn parses_the_shipped_pebble() {
    let (tx, mut rx) = mpsc::unbounded();
    let mut tracker = Tracker::new(tx);

    let model = fetch_model("gltf/pebble.gltf", &mut tracker)
        .await
        .expect("pebble.gltf should load");
    tracker.finish();

    assert_eq!(model.roots.len(), 1);
    let root = &model.roots[0];
    assert_eq!(root.name, "Pebble");
    assert_eq!(root.transform.scale, Vector3::new(1.4, 1.4, 1.4));
    assert_eq!(model.mesh_count(), 1);

    let geometry = &root.meshes[0].geometry;
    assert_eq!(geometry.vertices.len(), 42);
    assert_eq!(geometry.indices.len(), 240);
    assert!(geometry
        .indices
        .iter()
        .all(|&i| (i as usize) < geometry.vertices.len()));

    // the external buffer settles before the document that references it
    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            LoadEvent::Started,
            LoadEvent::Progress {
                url: "gltf/pebble.bin".into(),
                loaded: 1,
                total: 2
            },
            LoadEvent::Progress {
                url: "gltf/pebble.gltf".into(),
                loaded: 2,
                total: 2
            },
            LoadEvent::Finished,
        ]
    );
}

fn failures(events: &[LoadEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            LoadEvent::Failed { url, .. } => Some(url.as_str()),
            _ => None,
        })
        .collect()
}

// Fixtures live outside `assets/` so they never ship with the viewer.
const TRUNCATED: &str = "../tests/fixtures/truncated.gltf";
const DANGLING: &str = "../tests/fixtures/dangling.gltf";

#[tokio::test]
async fn an_unparsable_document_is_reported_as_failed() {
    let (tx, mut rx) = mpsc::unbounded();
    let mut tracker = Tracker::new(tx);

    assert!(fetch_model(TRUNCATED, &mut tracker).await.is_err());
    assert_eq!(tracker.counts(), (1, 1));
    tracker.finish();

    let events = drain(&mut rx);
    assert_eq!(failures(&events), vec![TRUNCATED]);
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, LoadEvent::Progress { .. }))
    );
    assert_eq!(events.last(), Some(&LoadEvent::Finished));
}

#[tokio::test]
async fn a_missing_buffer_fails_the_buffer_and_the_document() {
    let (tx, mut rx) = mpsc::unbounded();
    let mut tracker = Tracker::new(tx);

    assert!(fetch_model(DANGLING, &mut tracker).await.is_err());
    assert_eq!(tracker.counts(), (2, 2));
    tracker.finish();

    let events = drain(&mut rx);
    assert_eq!(
        failures(&events),
        vec!["../tests/fixtures/dangling.bin", DANGLING]
    );
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, LoadEvent::Progress { .. }))
    );
}

#[tokio::test]
async fn loads_the_default_assets() {
    let (tx, mut rx) = mpsc::unbounded();
    let assets = ViewerConfig::default().assets;

    let loaded = load_assets(&assets, tx).await;

    assert!(loaded.model.is_some());
    let texture = loaded.texture.expect("sphere.png should decode");
    assert_eq!((texture.width(), texture.height()), (128, 64));

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&LoadEvent::Started));
    assert_eq!(events.last(), Some(&LoadEvent::Finished));
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, LoadEvent::Failed { .. }))
    );
    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            LoadEvent::Progress { loaded, total, .. } => Some((*loaded, *total)),
            _ => None,
        });
    assert_eq!(last_progress, Some((3, 3)));
}

#[tokio::test]
async fn a_missing_model_fails_and_still_finishes() {
    let (tx, mut rx) = mpsc::unbounded();
    let assets = AssetConfig {
        model: "gltf/missing.gltf".to_string(),
        texture: "textures/sphere.png".to_string(),
    };

    let loaded = load_assets(&assets, tx).await;

    assert!(loaded.model.is_none());
    assert!(loaded.texture.is_some());

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&LoadEvent::Started));
    assert!(events.iter().any(|e| matches!(
        e,
        LoadEvent::Failed { url, .. } if url == "gltf/missing.gltf"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        LoadEvent::Progress { url, loaded: 2, total: 2 } if url == "textures/sphere.png"
    )));
    assert_eq!(events.last(), Some(&LoadEvent::Finished));
    assert_eq!(events.iter().filter(|e| **e == LoadEvent::Finished).count(), 1);
}
