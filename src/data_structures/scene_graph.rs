//! Scene graph and hierarchical scene organization.
//!
//! A tree of boxed [`SceneNode`]s. Every node owns a local [`Transform`] and
//! caches the world transform derived from its parent. Model nodes carry a
//! GPU [`Model`] plus a one-element instance buffer holding their world
//! matrix; container nodes only group children.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        geometry::Geometry,
        model::Model,
        transform::{InstanceRaw, Transform},
    },
    render::{Drawable, Render},
};

/// Which faces of a model are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Front,
    /// Only the inside is visible (skyboxes).
    Back,
}

pub trait SceneNode {
    fn local_transform(&self) -> &Transform;

    fn local_transform_mut(&mut self) -> &mut Transform;

    fn world_transform(&self) -> &Transform;

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.get_children_mut().push(child);
    }

    /// Recompute the world transform of this node and its subtree.
    fn update_world_transforms(&mut self, parent: &Transform);

    fn update_world_transform_all(&mut self) {
        self.update_world_transforms(&Transform::default());
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue);

    fn model_mut(&mut self) -> Option<&mut Model> {
        None
    }

    /// CPU triangles kept for ray picking, if any.
    fn geometry(&self) -> Option<&Geometry> {
        None
    }

    /// Enable or disable shadow casting on every model in this subtree.
    fn set_cast_shadow(&mut self, cast_shadow: bool) {
        for child in self.get_children_mut() {
            child.set_cast_shadow(cast_shadow);
        }
    }

    fn get_render(&self) -> Render<'_>;
}

pub struct ContainerNode {
    pub children: Vec<Box<dyn SceneNode>>,
    local: Transform,
    world: Transform,
}

impl ContainerNode {
    pub fn new(local: Transform) -> Self {
        Self {
            children: Vec::new(),
            world: local.clone(),
            local,
        }
    }
}

impl SceneNode for ContainerNode {
    fn local_transform(&self) -> &Transform {
        &self.local
    }

    fn local_transform_mut(&mut self) -> &mut Transform {
        &mut self.local
    }

    fn world_transform(&self) -> &Transform {
        &self.world
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn update_world_transforms(&mut self, parent: &Transform) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Render<'_> {
        Render::Composed(self.children.iter().map(|child| child.get_render()).collect())
    }
}

pub struct ModelNode {
    children: Vec<Box<dyn SceneNode>>,
    instance_buffer: wgpu::Buffer,
    local: Transform,
    world: Transform,
    model: Model,
    geometry: Option<Geometry>,
    cast_shadow: bool,
    side: Side,
}

impl ModelNode {
    pub fn new(device: &wgpu::Device, model: Model, local: Transform) -> Self {
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[local.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            children: vec![],
            instance_buffer,
            world: local.clone(),
            local,
            model,
            geometry: None,
            cast_shadow: false,
            side: Side::Front,
        }
    }

    /// Keep the CPU triangles so the node can be ray picked.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_cast_shadow(mut self, cast_shadow: bool) -> Self {
        self.cast_shadow = cast_shadow;
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }
}

impl SceneNode for ModelNode {
    fn local_transform(&self) -> &Transform {
        &self.local
    }

    fn local_transform_mut(&mut self) -> &mut Transform {
        &mut self.local
    }

    fn world_transform(&self) -> &Transform {
        &self.world
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn update_world_transforms(&mut self, parent: &Transform) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        let raw: [InstanceRaw; 1] = [self.world.to_raw()];
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn model_mut(&mut self) -> Option<&mut Model> {
        Some(&mut self.model)
    }

    fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    fn set_cast_shadow(&mut self, cast_shadow: bool) {
        self.cast_shadow = cast_shadow;
        for child in self.children.iter_mut() {
            child.set_cast_shadow(cast_shadow);
        }
    }

    fn get_render(&self) -> Render<'_> {
        let drawable = Drawable {
            instance: &self.instance_buffer,
            model: &self.model,
            cast_shadow: self.cast_shadow,
        };
        let own = match self.side {
            Side::Front => Render::Default(drawable),
            Side::Back => Render::Backside(drawable),
        };
        Render::Composed(
            self.children
                .iter()
                .map(|child| child.get_render())
                .chain([own])
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Point3, Vector3};

    use super::*;

    #[test]
    fn container_world_transforms_follow_the_parent_chain() {
        let mut root = ContainerNode::new(Transform::at(Vector3::new(1.0, 0.0, 0.0)));
        let mut middle = ContainerNode::new(Transform::at(Vector3::new(0.0, 2.0, 0.0)));
        middle.add_child(Box::new(ContainerNode::new(Transform::at(Vector3::new(
            0.0, 0.0, 3.0,
        )))));
        root.add_child(Box::new(middle));

        root.update_world_transform_all();

        let leaf = &root.get_children()[0].get_children()[0];
        let origin = leaf.world_transform().transform_point(Point3::new(0.0, 0.0, 0.0));
        assert!((origin - Point3::new(1.0, 2.0, 3.0)).magnitude() < 1e-6);
    }

    #[test]
    fn local_edits_apply_on_the_next_update() {
        let mut root = ContainerNode::new(Transform::default());
        root.add_child(Box::new(ContainerNode::new(Transform::default())));
        root.update_world_transform_all();

        root.local_transform_mut().scale = Vector3::new(2.0, 2.0, 2.0);
        root.get_children_mut()[0].local_transform_mut().position = Vector3::new(1.0, 0.0, 0.0);
        assert_eq!(root.get_children()[0].world_transform().position, Vector3::new(0.0, 0.0, 0.0));

        root.update_world_transform_all();
        assert_eq!(root.get_children()[0].world_transform().position, Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn containers_have_nothing_to_pick() {
        let node = ContainerNode::new(Transform::default());
        assert!(node.geometry().is_none());
        assert!(matches!(node.get_render(), Render::Composed(v) if v.is_empty()));
    }
}
