//! Asset loading and GPU upload.
//!
//! `loader` fetches and parses files off the GPU; this module turns the
//! parsed result into scene graph nodes.

pub mod loader;
pub mod texture;

use crate::data_structures::{
    model::{Material, Mesh, Model},
    scene_graph::{ContainerNode, ModelNode, SceneNode},
    transform::Transform,
};
use loader::{ModelData, NodeData};

/// Build a scene subtree from a parsed glTF scene.
///
/// Every mesh is drawn with `material` and casts shadows. A scene with
/// several root nodes is grouped under an extra container.
pub fn upload_model(device: &wgpu::Device, data: &ModelData, material: &Material) -> Box<dyn SceneNode> {
    let mut roots: Vec<Box<dyn SceneNode>> = data
        .roots
        .iter()
        .map(|node| to_scene_node(device, node, material))
        .collect();

    let mut root: Box<dyn SceneNode> = if roots.len() == 1 {
        roots.remove(0)
    } else {
        let mut container = ContainerNode::new(Transform::default());
        container.children = roots;
        Box::new(container)
    };
    root.set_cast_shadow(true);
    root
}

fn to_scene_node(device: &wgpu::Device, node: &NodeData, material: &Material) -> Box<dyn SceneNode> {
    let mut scene_node: Box<dyn SceneNode> = if node.meshes.is_empty() {
        Box::new(ContainerNode::new(node.transform.clone()))
    } else {
        let meshes = node
            .meshes
            .iter()
            .map(|mesh| Mesh::from_geometry(device, &mesh.name, &mesh.geometry, 0))
            .collect();
        let model = Model {
            meshes,
            materials: vec![material.clone()],
        };
        Box::new(ModelNode::new(device, model, node.transform.clone()))
    };
    for child in &node.children {
        scene_node.add_child(to_scene_node(device, child, material));
    }
    scene_node
}
