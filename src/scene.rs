//! The viewer's scene: a spinning box, the ground plane, the skybox, the
//! pickable target sphere and, once loaded, the external model.

use cgmath::{EuclideanSpace, Point3, Vector2, Vector3};

use crate::{
    camera::{Camera, Projection},
    config::SceneConfig,
    data_structures::{
        geometry::Geometry,
        model::{Material, MaterialParams, Model},
        scene_graph::{ContainerNode, ModelNode, SceneNode, Side},
        texture::Texture,
        transform::Transform,
    },
    pick::{self, Hit},
    render::Render,
    resources::{self, loader::ModelData},
};

pub struct Scene {
    cube: ModelNode,
    ground: ModelNode,
    skybox: ModelNode,
    target: ModelNode,
    model: Option<ContainerNode>,
    /// Shared by every marker; cloning a model shares its buffers.
    marker: Model,
    markers: usize,
    model_material: Material,
    model_offset: Vector3<f32>,
    box_spin: [f32; 3],
    sphere_spin: [f32; 3],
}

/// Euler angles after `elapsed` seconds at `spin` radians per second on each axis.
pub fn spin_angles(spin: [f32; 3], elapsed: f32) -> [f32; 3] {
    [spin[0] * elapsed, spin[1] * elapsed, spin[2] * elapsed]
}

impl Scene {
    pub fn new(
        device: &wgpu::Device,
        cfg: &SceneConfig,
        white: &Texture,
        material_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let material = |params: MaterialParams| Material::new(device, params, white.clone(), material_layout);

        let cube = {
            let geometry = Geometry::cuboid(cfg.box_size, cfg.box_size, cfg.box_size);
            let model = Model::from_geometry(
                device,
                "box",
                &geometry,
                material(MaterialParams::standard("box", [1.0, 1.0, 1.0])),
            );
            ModelNode::new(device, model, Transform::at(cfg.box_position)).with_cast_shadow(true)
        };

        let ground = {
            let geometry = Geometry::plane(cfg.plane_size, cfg.plane_size);
            let model = Model::from_geometry(
                device,
                "plane",
                &geometry,
                material(MaterialParams::standard("plane", [1.0, 1.0, 1.0])),
            );
            let mut local = Transform::at(Vector3::new(0.0, cfg.plane_height, 0.0));
            local.set_euler(-std::f32::consts::FRAC_PI_2, 0.0, 0.0);
            ModelNode::new(device, model, local)
        };

        let skybox = {
            let geometry = Geometry::cuboid(cfg.skybox_size, cfg.skybox_size, cfg.skybox_size);
            let model = Model::from_geometry(device, "skybox", &geometry, material(MaterialParams::skybox()));
            ModelNode::new(device, model, Transform::default()).with_side(Side::Back)
        };

        let target = {
            let (width_segments, height_segments) = cfg.sphere_segments;
            let geometry = Geometry::sphere(cfg.sphere_radius, width_segments, height_segments);
            let model = Model::from_geometry(
                device,
                "sphere",
                &geometry,
                material(MaterialParams::standard("sphere", [1.0, 1.0, 1.0])),
            );
            ModelNode::new(device, model, Transform::at(cfg.sphere_position))
                .with_geometry(geometry)
                .with_cast_shadow(true)
        };

        let marker = {
            let (width_segments, height_segments) = cfg.marker_segments;
            let geometry = Geometry::sphere(cfg.marker_radius, width_segments, height_segments);
            Model::from_geometry(
                device,
                "marker",
                &geometry,
                material(MaterialParams::marker(cfg.marker_color)),
            )
        };

        Self {
            cube,
            ground,
            skybox,
            target,
            model: None,
            marker,
            markers: 0,
            model_material: material(MaterialParams::white_physical()),
            model_offset: cfg.model_offset,
            box_spin: cfg.box_spin,
            sphere_spin: cfg.sphere_spin,
        }
    }

    /// Rotate the animated meshes to their pose `elapsed` seconds after start.
    pub fn animate(&mut self, elapsed: f32) {
        let [x, y, z] = spin_angles(self.box_spin, elapsed);
        self.cube.local_transform_mut().set_euler(x, y, z);
        let [x, y, z] = spin_angles(self.sphere_spin, elapsed);
        self.target.local_transform_mut().set_euler(x, y, z);
    }

    /// Add a loaded model at the model offset. Every mesh gets the white
    /// physical material and casts shadows.
    pub fn attach_model(&mut self, device: &wgpu::Device, data: &ModelData) {
        if self.model.is_some() {
            log::warn!("replacing the loaded model with {}", data.url);
        }
        let mut root = ContainerNode::new(Transform::at(self.model_offset));
        root.add_child(resources::upload_model(device, data, &self.model_material));
        log::info!("attached {} ({} meshes)", data.url, data.mesh_count());
        self.model = Some(root);
    }

    /// Use `texture` as the target sphere's diffuse map.
    pub fn apply_texture(
        &mut self,
        device: &wgpu::Device,
        texture: Texture,
        material_layout: &wgpu::BindGroupLayout,
    ) {
        if let Some(model) = self.target.model_mut() {
            for material in model.materials.iter_mut() {
                material.set_texture(device, texture.clone(), material_layout);
            }
        }
    }

    /// Attach a marker to the target sphere at a point in its local space.
    pub fn add_marker(&mut self, device: &wgpu::Device, local_point: Point3<f32>) {
        let node = ModelNode::new(device, self.marker.clone(), Transform::at(local_point.to_vec()));
        self.target.add_child(Box::new(node));
        self.markers += 1;
        log::info!("marker {} placed at {:?}", self.markers, local_point);
    }

    /// Pick the target sphere through `ndc` and mark the hit, if any.
    pub fn pick(
        &mut self,
        device: &wgpu::Device,
        ndc: Vector2<f32>,
        camera: &Camera,
        projection: &Projection,
    ) -> Option<Hit> {
        let mut placed = None;
        let hit = pick::pick_and_mark(ndc, camera, projection, &self.target, |p| placed = Some(p));
        if let Some(local_point) = placed {
            self.add_marker(device, local_point);
        }
        hit
    }

    /// Propagate transforms and upload the instance buffers.
    pub fn update(&mut self, queue: &wgpu::Queue) {
        let mut nodes: Vec<&mut dyn SceneNode> =
            vec![&mut self.cube, &mut self.ground, &mut self.skybox, &mut self.target];
        if let Some(model) = self.model.as_mut() {
            nodes.push(model);
        }
        for node in nodes {
            node.update_world_transform_all();
            node.write_to_buffers(queue);
        }
    }

    pub fn render(&self) -> Render<'_> {
        let mut renders = vec![
            self.skybox.get_render(),
            self.ground.get_render(),
            self.cube.get_render(),
            self.target.get_render(),
        ];
        if let Some(model) = &self.model {
            renders.push(model.get_render());
        }
        Render::Composed(renders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_is_proportional_to_elapsed_time() {
        let cfg = crate::config::ViewerConfig::default().scene;
        assert_eq!(spin_angles(cfg.box_spin, 0.0), [0.0, 0.0, 0.0]);
        let [x, y, z] = spin_angles(cfg.box_spin, 10.0);
        assert!((x - 2.0).abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
        assert_eq!(z, 0.0);
        let [x, y, _] = spin_angles(cfg.sphere_spin, 10.0);
        assert_eq!(x, 0.0);
        assert!((y - 0.5).abs() < 1e-6);
    }
}
