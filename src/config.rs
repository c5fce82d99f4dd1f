//! Compiled-in viewer configuration.
//!
//! The viewer has no configuration file and no CLI flags: every tuned value
//! (camera, controls, lights, fog, primitives, asset paths) lives in
//! [`ViewerConfig`] and its `Default` implementation. Downstream code reads
//! the values it needs from a shared reference instead of ambient globals.

use std::f32::consts::{FRAC_PI_2, PI};

use cgmath::{Point3, Vector3};

/// Perspective camera parameters.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

/// Orbit control tuning. Angles are in radians and measured from +Y.
#[derive(Clone, Debug)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

#[derive(Clone, Debug)]
pub struct SunConfig {
    pub position: Point3<f32>,
    pub color: [f32; 3],
    pub intensity: f32,
    /// Requested edge length of the square shadow map; clamped to the device limit.
    pub shadow_map_size: u32,
    pub shadow_near: f32,
    pub shadow_far: f32,
    /// Half width/height of the orthographic shadow camera.
    pub shadow_extent: f32,
    pub shadow_bias: f32,
    pub shadow_radius: f32,
}

#[derive(Clone, Debug)]
pub struct AmbientConfig {
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Linear fog, blended with a smoothstep between `near` and `far`.
#[derive(Clone, Debug)]
pub struct FogConfig {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub box_size: f32,
    pub box_position: Vector3<f32>,
    pub plane_size: f32,
    pub plane_height: f32,
    pub skybox_size: f32,
    pub sphere_radius: f32,
    pub sphere_segments: (u32, u32),
    pub sphere_position: Vector3<f32>,
    pub model_offset: Vector3<f32>,
    pub marker_radius: f32,
    pub marker_segments: (u32, u32),
    pub marker_color: [f32; 3],
    /// Angular velocity (rad/s) around x, y, z for the spinning box.
    pub box_spin: [f32; 3],
    pub sphere_spin: [f32; 3],
}

#[derive(Clone, Debug)]
pub struct AssetConfig {
    pub model: String,
    pub texture: String,
}

/// Every compiled-in parameter of the viewer.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub sun: SunConfig,
    pub ambient: AmbientConfig,
    pub fog: FogConfig,
    pub scene: SceneConfig,
    pub assets: AssetConfig,
    pub max_pixel_ratio: f64,
    /// Samples per pixel of the main pass; falls back to 1 where unsupported.
    pub sample_count: u32,
    pub clear_colour: wgpu::Color,
    pub indicator_fade_millis: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                fov_y_deg: 75.0,
                near: 0.1,
                far: 1000.0,
                position: Point3::new(0.0, 0.0, 4.0),
                target: Point3::new(0.0, 0.0, 0.0),
            },
            controls: ControlsConfig {
                enable_damping: true,
                damping_factor: 0.025,
                min_polar_angle: 0.0,
                max_polar_angle: FRAC_PI_2,
                min_distance: 2.0,
                max_distance: 20.0,
                rotate_speed: 1.0,
                zoom_speed: 1.0,
                pan_speed: 1.0,
            },
            sun: SunConfig {
                position: Point3::new(15.0, 50.0, 30.0),
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
                shadow_map_size: 1024 * 4,
                shadow_near: 0.5,
                shadow_far: 500.0,
                shadow_extent: 5.0,
                shadow_bias: 0.0005,
                shadow_radius: 1.0,
            },
            ambient: AmbientConfig {
                color: [1.0, 1.0, 1.0],
                intensity: 0.5,
            },
            fog: FogConfig {
                color: [1.0, 1.0, 1.0],
                near: 10.0,
                far: 50.0,
            },
            scene: SceneConfig {
                box_size: 1.0,
                box_position: Vector3::new(-1.0, 0.0, 0.0),
                plane_size: 10000.0,
                plane_height: -0.5,
                skybox_size: 1000.0,
                sphere_radius: 1.0,
                sphere_segments: (64, 64),
                sphere_position: Vector3::new(0.0, 1.0, -2.5),
                model_offset: Vector3::new(1.0, -0.5, 0.0),
                marker_radius: 0.03,
                marker_segments: (16, 12),
                marker_color: [1.0, 0.0, 0.0],
                box_spin: [0.2, 0.1, 0.0],
                sphere_spin: [0.0, 0.05, 0.0],
            },
            assets: AssetConfig {
                model: "gltf/pebble.gltf".to_string(),
                texture: "textures/sphere.png".to_string(),
            },
            max_pixel_ratio: 2.0,
            sample_count: 4,
            clear_colour: wgpu::Color::WHITE,
            indicator_fade_millis: 1000,
        }
    }
}

impl ControlsConfig {
    /// Polar limits clamped into `[0, PI]` and ordered.
    pub fn polar_range(&self) -> (f32, f32) {
        let min = self.min_polar_angle.clamp(0.0, PI);
        let max = self.max_polar_angle.clamp(min, PI);
        (min, max)
    }
}
