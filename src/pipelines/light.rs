use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    config::{AmbientConfig, FogConfig, SunConfig},
    data_structures::texture,
};

/// Lighting state shared by every lit draw: sun, ambient light, fog and the
/// parameters of the shadow map lookup.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    light_view_proj: [[f32; 4]; 4],
    /// xyz points towards the sun, w is the intensity
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    /// rgb already scaled by the ambient intensity
    ambient: [f32; 4],
    fog_color: [f32; 4],
    /// near, far
    fog: [f32; 4],
    /// radius, map size, bias, enabled
    shadow: [f32; 4],
}

impl LightUniform {
    pub fn new(sun: &SunConfig, ambient: &AmbientConfig, fog: &FogConfig, shadow_map_size: u32) -> Self {
        let direction = (sun.position - Point3::origin()).normalize();
        Self {
            light_view_proj: sun_view_proj(sun).into(),
            sun_direction: [direction.x, direction.y, direction.z, sun.intensity],
            sun_color: [sun.color[0], sun.color[1], sun.color[2], 1.0],
            ambient: [
                ambient.color[0] * ambient.intensity,
                ambient.color[1] * ambient.intensity,
                ambient.color[2] * ambient.intensity,
                1.0,
            ],
            fog_color: [fog.color[0], fog.color[1], fog.color[2], 1.0],
            fog: [fog.near, fog.far, 0.0, 0.0],
            shadow: [sun.shadow_radius, shadow_map_size as f32, sun.shadow_bias, 1.0],
        }
    }

    pub fn shadow_radius(&self) -> f32 {
        self.shadow[0]
    }

    pub fn set_shadow_radius(&mut self, radius: f32) {
        self.shadow[0] = radius;
    }

    pub fn fog_far(&self) -> f32 {
        self.fog[1]
    }

    pub fn set_fog_far(&mut self, far: f32) {
        self.fog[1] = far;
    }
}

/// Orthographic shadow camera looking from the sun towards the origin.
pub fn sun_view_proj(sun: &SunConfig) -> Matrix4<f32> {
    let view = Matrix4::look_at_rh(sun.position, Point3::origin(), cgmath::Vector3::unit_y());
    let e = sun.shadow_extent;
    let proj = cgmath::ortho(-e, e, -e, e, sun.shadow_near, sun.shadow_far);
    let view_proj = OPENGL_TO_WGPU_MATRIX * proj * view;
    if view_proj.invert().is_none() {
        log::warn!("degenerate shadow camera for sun at {:?}", sun.position);
    }
    view_proj
}

/// Shadow map edge length: the requested size, clamped to what the device supports.
pub fn shadow_map_size(requested: u32, max_texture_dimension: u32) -> u32 {
    if requested > max_texture_dimension {
        log::warn!(
            "shadow map size {} exceeds the device limit, using {}",
            requested,
            max_texture_dimension
        );
        return max_texture_dimension;
    }
    requested.max(1)
}

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: texture::Texture,
    /// Bound by the lit pipelines: uniform, shadow map and comparison sampler.
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Bound by the shadow pass, which cannot sample the map it renders into.
    pub shadow_bind_group: wgpu::BindGroup,
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
    dirty: bool,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightUniform, shadow_map_size: u32) -> Self {
        let buffer = mk_buffer(device, uniform);
        let shadow_map = texture::Texture::create_depth_texture(
            device,
            [shadow_map_size, shadow_map_size],
            1,
            "shadow_map",
        );
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer, &shadow_map);
        let shadow_bind_group_layout = mk_shadow_bind_group_layout(device);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });
        Self {
            uniform,
            buffer,
            shadow_map,
            bind_group,
            bind_group_layout,
            shadow_bind_group,
            shadow_bind_group_layout,
            dirty: false,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Upload the uniform if it changed since the last call.
    pub fn write(&mut self, queue: &wgpu::Queue) {
        if self.dirty {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
            self.dirty = false;
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("shadow_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
    shadow_map: &texture::Texture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&shadow_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
            },
        ],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use cgmath::{Transform, Vector4};

    use super::*;
    use crate::config::ViewerConfig;

    #[test]
    fn uniform_is_sixteen_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightUniform>() % 16, 0);
    }

    #[test]
    fn shadow_map_is_clamped_to_the_device() {
        assert_eq!(shadow_map_size(4096, 2048), 2048);
        assert_eq!(shadow_map_size(4096, 8192), 4096);
    }

    #[test]
    fn origin_projects_into_the_shadow_map() {
        let sun = ViewerConfig::default().sun;
        let clip = sun_view_proj(&sun) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
        // a point towards the sun is closer to the light
        let nearer = sun_view_proj(&sun).transform_point(Point3::new(0.15, 0.5, 0.3));
        assert!(nearer.z < ndc.z);
    }

    #[test]
    fn debug_setters_touch_only_their_field() {
        let cfg = ViewerConfig::default();
        let mut uniform = LightUniform::new(&cfg.sun, &cfg.ambient, &cfg.fog, 4096);
        uniform.set_shadow_radius(3.5);
        uniform.set_fog_far(120.0);
        assert_eq!(uniform.shadow_radius(), 3.5);
        assert_eq!(uniform.fog_far(), 120.0);
        assert_eq!(uniform.fog[0], cfg.fog.near);
        assert_eq!(uniform.shadow[1], 4096.0);
    }
}
