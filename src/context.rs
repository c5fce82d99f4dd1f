//! GPU and window context: surface, device, queue, camera and light
//! resources, and the pipelines that draw the scene.

use std::sync::Arc;

use anyhow::Context as _;
use cgmath::Deg;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, CameraUniform, Projection},
    config::ViewerConfig,
    data_structures::texture,
    pipelines::{
        basic::mk_lit_pipeline,
        light::{self, LightResources, LightUniform},
        shadow::mk_shadow_pipeline,
        Pipelines,
    },
    resources::texture::material_layout,
    viewport::Viewport,
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    /// Multisampled colour target resolved into the surface; `None` at one sample.
    pub(crate) msaa_target: Option<wgpu::TextureView>,
    pub sample_count: u32,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub material_layout: wgpu::BindGroupLayout,
    /// Diffuse map of every untextured material.
    pub white: texture::Texture,
    pub clear_colour: wgpu::Color,
    max_pixel_ratio: f64,
}

impl Context {
    pub async fn new(window: Arc<Window>, cfg: &ViewerConfig, viewport: &Viewport) -> anyhow::Result<Self> {
        let size = viewport.surface_size(cfg.max_pixel_ratio);

        log::info!("creating wgpu instance");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                experimental_features: Default::default(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // the shaders output linear colour and rely on an sRGB surface
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sample_count = supported_sample_count(cfg.sample_count, |count| {
            [surface_format, texture::Texture::DEPTH_FORMAT].iter().all(|&format| {
                adapter
                    .get_texture_format_features(format)
                    .flags
                    .sample_count_supported(count)
            })
        });
        log::info!("main pass uses {} sample(s) per pixel", sample_count);

        let camera_cfg = &cfg.camera;
        let camera = Camera::from(camera_cfg);
        let projection = Projection::new(
            viewport.width,
            viewport.height,
            Deg(camera_cfg.fov_y_deg),
            camera_cfg.near,
            camera_cfg.far,
        );
        let camera = mk_camera_resources(&device, camera, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_target = mk_msaa_target(&device, &config, sample_count);

        let shadow_map_size =
            light::shadow_map_size(cfg.sun.shadow_map_size, device.limits().max_texture_dimension_2d);
        let light_uniform = LightUniform::new(&cfg.sun, &cfg.ambient, &cfg.fog, shadow_map_size);
        let light = LightResources::new(&device, light_uniform, shadow_map_size);

        let material_layout = material_layout(&device);
        let pipelines = Pipelines {
            lit: mk_lit_pipeline(
                &device,
                &config,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
                wgpu::Face::Back,
                sample_count,
            ),
            backside: mk_lit_pipeline(
                &device,
                &config,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
                wgpu::Face::Front,
                sample_count,
            ),
            shadow: mk_shadow_pipeline(&device, &light.shadow_bind_group_layout),
        };

        let white = texture::Texture::create_solid([255, 255, 255, 255], 1, 1, &device, &queue);

        Ok(Self {
            window,
            depth_texture,
            msaa_target,
            sample_count,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            pipelines,
            material_layout,
            white,
            clear_colour: cfg.clear_colour,
            max_pixel_ratio: cfg.max_pixel_ratio,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Follow a new viewport: camera aspect, surface size (pixel ratio capped)
    /// and depth texture. Empty viewports are ignored.
    pub fn resize(&mut self, viewport: &Viewport) {
        if viewport.is_empty() {
            log::debug!("ignoring resize to an empty viewport {:?}", viewport);
            return;
        }
        let size = viewport.surface_size(self.max_pixel_ratio);
        self.projection.resize(viewport.width, viewport.height);
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            self.sample_count,
            "depth_texture",
        );
        self.msaa_target = mk_msaa_target(&self.device, &self.config, self.sample_count);
    }
}

/// `requested` if the adapter can render with it, otherwise a single sample.
pub fn supported_sample_count(requested: u32, supported: impl Fn(u32) -> bool) -> u32 {
    if requested > 1 && supported(requested) {
        requested
    } else {
        if requested > 1 {
            log::warn!("{}x multisampling is not supported, rendering without", requested);
        }
        1
    }
}

fn mk_msaa_target(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> Option<wgpu::TextureView> {
    (sample_count > 1).then(|| texture::Texture::create_msaa_target(device, config, sample_count))
}

fn mk_camera_resources(device: &wgpu::Device, camera: Camera, projection: &Projection) -> CameraResources {
    let mut uniform = CameraUniform::new();
    uniform.update_view_proj(&camera, projection);

    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Camera Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some("camera_bind_group"),
    });

    CameraResources {
        camera,
        uniform,
        buffer,
        bind_group,
        bind_group_layout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_samples_are_kept_when_supported() {
        assert_eq!(supported_sample_count(4, |count| count == 4), 4);
    }

    #[test]
    fn unsupported_samples_fall_back_to_one() {
        assert_eq!(supported_sample_count(4, |count| count == 1), 1);
        assert_eq!(supported_sample_count(1, |_| false), 1);
        assert_eq!(supported_sample_count(0, |_| true), 1);
    }
}
