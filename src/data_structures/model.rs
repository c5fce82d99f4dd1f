//! Meshes, materials and the draw helpers used by the render passes.
//!
//! A [`Model`] is a list of GPU meshes plus the materials they index into.
//! Materials are a small physical-style parameter block (colour, emissive,
//! roughness, metalness) with a diffuse texture; untextured materials bind a
//! 1×1 white texture so every mesh goes through the same pipeline.

use std::ops::Range;

use wgpu::util::DeviceExt;

use crate::data_structures::{geometry::Geometry, texture::Texture};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// CPU description of a material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialParams {
    pub name: String,
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub receive_shadow: bool,
    /// Skip lighting, fog and shadows entirely and output `color`.
    pub unlit: bool,
}

impl MaterialParams {
    pub fn standard(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
            emissive: [0.0; 3],
            roughness: 1.0,
            metalness: 0.0,
            receive_shadow: true,
            unlit: false,
        }
    }

    /// The plain white physical material every loaded mesh is given.
    pub fn white_physical() -> Self {
        Self::standard("white physical", [1.0, 1.0, 1.0])
    }

    /// Back-facing box around the scene: white and fully emissive.
    pub fn skybox() -> Self {
        Self {
            emissive: [1.0, 1.0, 1.0],
            receive_shadow: false,
            ..Self::standard("skybox", [1.0, 1.0, 1.0])
        }
    }

    pub fn marker(color: [f32; 3]) -> Self {
        Self {
            receive_shadow: false,
            unlit: true,
            ..Self::standard("marker", color)
        }
    }

    fn to_uniform(&self) -> MaterialUniform {
        MaterialUniform {
            color: [self.color[0], self.color[1], self.color[2], 1.0],
            emissive: [self.emissive[0], self.emissive[1], self.emissive[2], 0.0],
            params: [
                self.roughness,
                self.metalness,
                if self.receive_shadow { 1.0 } else { 0.0 },
                if self.unlit { 1.0 } else { 0.0 },
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    color: [f32; 4],
    emissive: [f32; 4],
    /// roughness, metalness, receive shadow, unlit
    params: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct Material {
    pub params: MaterialParams,
    pub diffuse_texture: Texture,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        params: MaterialParams,
        diffuse_texture: Texture,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} material buffer", params.name)),
            contents: bytemuck::cast_slice(&[params.to_uniform()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = mk_bind_group(device, &params.name, &buffer, &diffuse_texture, layout);
        Self {
            params,
            diffuse_texture,
            buffer,
            bind_group,
        }
    }

    /// Swap the diffuse map; the bind group is rebuilt around the new texture.
    pub fn set_texture(
        &mut self,
        device: &wgpu::Device,
        texture: Texture,
        layout: &wgpu::BindGroupLayout,
    ) {
        self.diffuse_texture = texture;
        self.bind_group = mk_bind_group(
            device,
            &self.params.name,
            &self.buffer,
            &self.diffuse_texture,
            layout,
        );
    }
}

fn mk_bind_group(
    device: &wgpu::Device,
    name: &str,
    buffer: &wgpu::Buffer,
    texture: &Texture,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
        label: Some(name),
    })
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: usize,
}

impl Mesh {
    pub fn from_geometry(device: &wgpu::Device, name: &str, geometry: &Geometry, material: usize) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: geometry.indices.len() as u32,
            material,
        }
    }
}

/// Buffers and bind groups are reference counted, so cloning a model shares its GPU data.
#[derive(Clone, Debug)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

impl Model {
    /// A single-mesh model with its own material.
    pub fn from_geometry(device: &wgpu::Device, name: &str, geometry: &Geometry, material: Material) -> Self {
        Self {
            meshes: vec![Mesh::from_geometry(device, name, geometry, 0)],
            materials: vec![material],
        }
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'a Mesh,
        material: &'a Material,
        instances: Range<u32>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    );

    fn draw_model_instanced(
        &mut self,
        model: &'a Model,
        instances: Range<u32>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'b Mesh,
        material: &'b Material,
        instances: Range<u32>,
        camera_bind_group: &'b wgpu::BindGroup,
        light_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }

    fn draw_model_instanced(
        &mut self,
        model: &'b Model,
        instances: Range<u32>,
        camera_bind_group: &'b wgpu::BindGroup,
        light_bind_group: &'b wgpu::BindGroup,
    ) {
        for mesh in &model.meshes {
            let Some(material) = model.materials.get(mesh.material) else {
                log::warn!("mesh {} references missing material {}", mesh.name, mesh.material);
                continue;
            };
            self.draw_mesh_instanced(
                mesh,
                material,
                instances.clone(),
                camera_bind_group,
                light_bind_group,
            );
        }
    }
}

/// Depth-only drawing into the shadow map; materials are not bound.
pub trait DrawShadow<'a> {
    fn draw_model_shadow(
        &mut self,
        model: &'a Model,
        instances: Range<u32>,
        shadow_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a, 'b> DrawShadow<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_model_shadow(
        &mut self,
        model: &'b Model,
        instances: Range<u32>,
        shadow_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_bind_group(0, shadow_bind_group, &[]);
        for mesh in &model.meshes {
            self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            self.draw_indexed(0..mesh.num_elements, 0, instances.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_struct() {
        let layout = ModelVertex::desc();
        assert_eq!(layout.array_stride, std::mem::size_of::<ModelVertex>() as u64);
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[2].offset, 20);
    }

    #[test]
    fn marker_material_is_unlit() {
        let uniform = MaterialParams::marker([1.0, 0.0, 0.0]).to_uniform();
        assert_eq!(uniform.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniform.params[3], 1.0);
        assert_eq!(uniform.params[2], 0.0);
    }

    #[test]
    fn skybox_is_fully_emissive() {
        let params = MaterialParams::skybox();
        assert_eq!(params.emissive, [1.0; 3]);
        assert_eq!(params.roughness, 1.0);
        assert_eq!(params.metalness, 0.0);
    }
}
