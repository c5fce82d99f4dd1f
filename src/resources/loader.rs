//! Asynchronous asset loading with progress reporting.
//!
//! Loading is one future per asset batch. Progress travels over a side
//! channel as [`LoadEvent`]s, with the counting rules of a loading manager:
//! `total` grows whenever a new file is discovered (the glTF document, then
//! each external buffer it references, then the texture), `Started` is sent
//! once before anything else and `Finished` once after every file settled.
//! A glTF document settles after its buffers.
//!
//! Everything here is CPU only; the driver uploads the result to the GPU.

use std::collections::HashSet;

use anyhow::{Context as _, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cgmath::{Quaternion, Vector3};
use futures::channel::mpsc::UnboundedSender;

use crate::{
    config::AssetConfig,
    data_structures::{
        geometry::{Geometry, compute_normals, sequential_indices},
        model::ModelVertex,
        texture::decode,
        transform::Transform,
    },
    resources::texture::load_binary,
};

#[derive(Clone, Debug, PartialEq)]
pub enum LoadEvent {
    Started,
    Progress {
        url: String,
        loaded: usize,
        total: usize,
    },
    /// A file that will not load. It still counts towards `loaded`.
    Failed {
        url: String,
        reason: String,
        loaded: usize,
        total: usize,
    },
    Finished,
}

/// Counts discovered and settled files and reports them on the channel.
pub struct Tracker {
    tx: UnboundedSender<LoadEvent>,
    pending: HashSet<String>,
    loaded: usize,
    total: usize,
    started: bool,
}

impl Tracker {
    pub fn new(tx: UnboundedSender<LoadEvent>) -> Self {
        Self {
            tx,
            pending: HashSet::new(),
            loaded: 0,
            total: 0,
            started: false,
        }
    }

    fn send(&self, event: LoadEvent) {
        // the receiver only goes away when the viewer shuts down
        if self.tx.unbounded_send(event).is_err() {
            log::debug!("load event dropped, nobody is listening");
        }
    }

    /// Register a file. Registering a file that is still pending is a no-op.
    pub fn item_start(&mut self, url: &str) {
        if !self.started {
            self.started = true;
            self.send(LoadEvent::Started);
        }
        if self.pending.insert(url.to_string()) {
            self.total += 1;
            log::debug!("loading {} ({} files known)", url, self.total);
        }
    }

    pub fn item_end(&mut self, url: &str) {
        if self.pending.remove(url) {
            self.loaded += 1;
            self.send(LoadEvent::Progress {
                url: url.to_string(),
                loaded: self.loaded,
                total: self.total,
            });
        }
    }

    pub fn item_error(&mut self, url: &str, error: &anyhow::Error) {
        if self.pending.remove(url) {
            self.loaded += 1;
            self.send(LoadEvent::Failed {
                url: url.to_string(),
                reason: format!("{:#}", error),
                loaded: self.loaded,
                total: self.total,
            });
        }
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.loaded, self.total)
    }

    /// Report `Finished`, once, if anything was started.
    pub fn finish(self) {
        if self.started {
            self.send(LoadEvent::Finished);
        }
    }
}

/// One glTF node: its local transform, the meshes it draws and its children.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<MeshData>,
    pub children: Vec<NodeData>,
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub geometry: Geometry,
}

/// The parsed content of a glTF scene.
#[derive(Clone, Debug)]
pub struct ModelData {
    pub url: String,
    pub roots: Vec<NodeData>,
}

impl ModelData {
    pub fn mesh_count(&self) -> usize {
        fn count(node: &NodeData) -> usize {
            node.meshes.len() + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }
}

/// Everything the viewer asked for; `None` where loading failed.
#[derive(Debug, Default)]
pub struct LoadedAssets {
    pub model: Option<ModelData>,
    pub texture: Option<image::DynamicImage>,
}

async fn fetch(url: &str, tracker: &mut Tracker) -> anyhow::Result<Vec<u8>> {
    tracker.item_start(url);
    match load_binary(url).await {
        Ok(bytes) => {
            tracker.item_end(url);
            Ok(bytes)
        }
        Err(e) => {
            tracker.item_error(url, &e);
            Err(e)
        }
    }
}

/// Resolve `uri` relative to the directory of `base`.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}{}", &base[..=idx], uri),
        None => uri.to_string(),
    }
}

/// Fetch and parse a `.gltf` (external or `data:` buffers) or `.glb` (embedded blob).
///
/// The document settles only once it parsed and every buffer it references
/// resolved; any error on the way reports it as failed.
pub async fn fetch_model(url: &str, tracker: &mut Tracker) -> anyhow::Result<ModelData> {
    tracker.item_start(url);
    let result = match load_binary(url).await {
        Ok(bytes) => parse_model(url, &bytes, tracker).await,
        Err(e) => Err(e),
    };
    match &result {
        Ok(_) => tracker.item_end(url),
        Err(e) => tracker.item_error(url, e),
    }
    result
}

async fn parse_model(url: &str, bytes: &[u8], tracker: &mut Tracker) -> anyhow::Result<ModelData> {
    let gltf = gltf::Gltf::from_slice(bytes).with_context(|| format!("cannot parse {}", url))?;

    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => match gltf.blob.as_deref() {
                Some(blob) => blob.to_vec(),
                None => bail!("{} references a binary chunk it does not have", url),
            },
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                decode_data_uri(uri).with_context(|| format!("{}: bad buffer {}", url, buffer.index()))?
            }
            gltf::buffer::Source::Uri(uri) => fetch(&resolve_relative(url, uri), tracker).await?,
        };
        if data.len() < buffer.length() {
            bail!(
                "{}: buffer {} holds {} bytes, {} expected",
                url,
                buffer.index(),
                data.len(),
                buffer.length()
            );
        }
        buffer_data.push(data);
    }

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{} contains no scene", url))?;
    let roots = scene
        .nodes()
        .map(|node| to_node_data(node, &buffer_data))
        .collect();

    Ok(ModelData {
        url: url.to_string(),
        roots,
    })
}

/// Decode a base64 `data:` URI, e.g. `data:application/octet-stream;base64,AAAA`.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<Vec<u8>> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .context("malformed data URI")?;
    if !header.ends_with(";base64") {
        bail!("only base64 data URIs are supported, got {}", header);
    }
    Ok(STANDARD.decode(payload)?)
}

fn to_node_data(node: gltf::Node, buffers: &[Vec<u8>]) -> NodeData {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Transform {
        position: translation.into(),
        rotation: Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: Vector3::from(scale),
    };

    let meshes = node
        .mesh()
        .map(|mesh| {
            let name = mesh.name().unwrap_or("unknown_mesh").to_string();
            mesh.primitives()
                .filter_map(|primitive| {
                    read_primitive(&primitive, buffers).map(|geometry| MeshData {
                        name: name.clone(),
                        geometry,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    NodeData {
        name: node.name().unwrap_or("node").to_string(),
        transform,
        meshes,
        children: node
            .children()
            .map(|child| to_node_data(child, buffers))
            .collect(),
    }
}

fn read_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Option<Geometry> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!(
            "skipping primitive {} drawn as {:?}, only triangles are supported",
            primitive.index(),
            primitive.mode()
        );
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| b.as_slice()));

    let Some(positions) = reader.read_positions() else {
        log::warn!("skipping primitive {} without positions", primitive.index());
        return None;
    };
    let positions: Vec<[f32; 3]> = positions.collect();

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => sequential_indices(positions.len()),
    };
    if let Some(&out_of_range) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        log::warn!(
            "skipping primitive {}: index {} out of range",
            primitive.index(),
            out_of_range
        );
        return None;
    }

    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(normals) => normals.collect(),
        None => compute_normals(&positions, &indices),
    };
    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().collect())
        .unwrap_or_default();

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| ModelVertex {
            position,
            tex_coords: tex_coords.get(i).copied().unwrap_or_default(),
            normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
        })
        .collect();

    Some(Geometry::new(vertices, indices))
}

/// Fetch and decode an image file.
pub async fn fetch_image(url: &str, tracker: &mut Tracker) -> anyhow::Result<image::DynamicImage> {
    let bytes = fetch(url, tracker).await?;
    let extension = url.rsplit('.').next();
    decode(&bytes, extension).with_context(|| format!("cannot decode {}", url))
}

/// Load the model and the texture, reporting progress on `tx`.
///
/// Both top level files are registered up front, so the first progress
/// report already counts them. Failures are logged with their URL and leave
/// the corresponding field empty.
pub async fn load_assets(assets: &AssetConfig, tx: UnboundedSender<LoadEvent>) -> LoadedAssets {
    let mut tracker = Tracker::new(tx);
    tracker.item_start(&assets.model);
    tracker.item_start(&assets.texture);

    let model = match fetch_model(&assets.model, &mut tracker).await {
        Ok(model) => Some(model),
        Err(e) => {
            log::error!("failed to load {}: {:#}", assets.model, e);
            None
        }
    };
    let texture = match fetch_image(&assets.texture, &mut tracker).await {
        Ok(image) => Some(image),
        Err(e) => {
            log::error!("failed to load {}: {:#}", assets.texture, e);
            None
        }
    };

    let (loaded, total) = tracker.counts();
    log::info!("asset loading settled: {}/{} files", loaded, total);
    tracker.finish();
    LoadedAssets { model, texture }
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, channel::mpsc};

    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<LoadEvent>) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = rx.try_next() {
            events.push(event);
        }
        events
    }

    #[test]
    fn started_once_then_progress_then_finished() {
        let (tx, mut rx) = mpsc::unbounded();
        let mut tracker = Tracker::new(tx);
        for url in ["a", "b", "c", "d"] {
            tracker.item_start(url);
        }
        tracker.item_end("a");
        tracker.item_end("b");
        tracker.item_end("c");
        tracker.item_end("d");
        tracker.finish();

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&LoadEvent::Started));
        assert_eq!(events.iter().filter(|e| **e == LoadEvent::Started).count(), 1);
        assert_eq!(
            events[1],
            LoadEvent::Progress {
                url: "a".into(),
                loaded: 1,
                total: 4
            }
        );
        assert_eq!(events.last(), Some(&LoadEvent::Finished));
        assert_eq!(events.len(), 6);
    }

    #[test]
    fn total_grows_as_files_are_discovered() {
        let (tx, mut rx) = mpsc::unbounded();
        let mut tracker = Tracker::new(tx);
        tracker.item_start("scene.gltf");
        tracker.item_end("scene.gltf");
        tracker.item_start("scene.bin");
        tracker.item_start("scene.bin");
        tracker.item_end("scene.bin");
        drop(tracker);

        let events = drain(&mut rx);
        assert_eq!(
            events[1..],
            [
                LoadEvent::Progress {
                    url: "scene.gltf".into(),
                    loaded: 1,
                    total: 1
                },
                LoadEvent::Progress {
                    url: "scene.bin".into(),
                    loaded: 2,
                    total: 2
                },
            ]
        );
    }

    #[test]
    fn a_failed_file_settles_without_progress() {
        let (tx, mut rx) = mpsc::unbounded();
        let mut tracker = Tracker::new(tx);
        tracker.item_start("missing.gltf");
        tracker.item_error("missing.gltf", &anyhow::anyhow!("not found"));
        // settling twice is ignored
        tracker.item_end("missing.gltf");
        assert_eq!(tracker.counts(), (1, 1));
        tracker.finish();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                LoadEvent::Started,
                LoadEvent::Failed {
                    url: "missing.gltf".into(),
                    reason: "not found".into(),
                    loaded: 1,
                    total: 1
                },
                LoadEvent::Finished,
            ]
        );
    }

    #[test]
    fn nothing_started_means_nothing_finished() {
        let (tx, mut rx) = mpsc::unbounded();
        Tracker::new(tx).finish();
        assert!(futures::executor::block_on(rx.next()).is_none());
    }

    #[test]
    fn buffers_resolve_next_to_the_document() {
        assert_eq!(resolve_relative("gltf/pebble.gltf", "pebble.bin"), "gltf/pebble.bin");
        assert_eq!(resolve_relative("pebble.gltf", "pebble.bin"), "pebble.bin");
    }

    #[test]
    fn data_uris_decode() {
        let bytes = decode_data_uri("data:application/octet-stream;base64,AAECAw==").unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("data:application/octet-stream;base64").is_err());
    }

    /// One triangle in the XY plane with its positions and indices in a
    /// base64 buffer.
    const EMBEDDED_TRIANGLE: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Triangle", "mesh": 0 }],
        "meshes": [{ "name": "triangle", "primitives": [{ "attributes": { "POSITION": 1 }, "indices": 0 }] }],
        "buffers": [{
            "uri": "data:application/octet-stream;base64,AAABAAIAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAACAPwAAAAA=",
            "byteLength": 44
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 6, "target": 34963 },
            { "buffer": 0, "byteOffset": 8, "byteLength": 36, "target": 34962 }
        ],
        "accessors": [
            { "bufferView": 0, "byteOffset": 0, "componentType": 5123, "count": 3, "type": "SCALAR", "max": [2], "min": [0] },
            { "bufferView": 1, "byteOffset": 0, "componentType": 5126, "count": 3, "type": "VEC3", "max": [1.0, 1.0, 0.0], "min": [0.0, 0.0, 0.0] }
        ]
    }"#;

    #[test]
    fn embedded_buffers_need_no_extra_files() {
        let (tx, mut rx) = mpsc::unbounded();
        let mut tracker = Tracker::new(tx);
        tracker.item_start("triangle.gltf");

        let model = futures::executor::block_on(parse_model(
            "triangle.gltf",
            EMBEDDED_TRIANGLE.as_bytes(),
            &mut tracker,
        ))
        .unwrap();

        assert_eq!(model.roots[0].name, "Triangle");
        let geometry = &model.roots[0].meshes[0].geometry;
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        let positions: Vec<[f32; 3]> = geometry.vertices.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        // normals were computed from the winding
        assert_eq!(geometry.vertices[0].normal, [0.0, 0.0, 1.0]);
        // nothing but the document was ever registered
        assert_eq!(tracker.counts(), (0, 1));
        assert_eq!(drain(&mut rx), vec![LoadEvent::Started]);
    }
}
