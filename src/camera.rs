//! Perspective camera, projection and camera uniforms.
//!
//! The camera is a look-at camera (position + target) so that the orbit
//! controls can move it around a pivot. [`Projection`] owns the aspect ratio
//! and is rebuilt on every resize. [`Camera::cast_ray`] unprojects a point in
//! normalized device coordinates into a world-space [`Ray`] for picking.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector2, Vector3, Vector4};

use crate::config::CameraConfig;

/// wgpu's clip space has z in `[0, 1]` whereas cgmath builds OpenGL style `[-1, 1]` matrices.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    /// Cast a ray from the camera through `ndc` (both axes in `[-1, 1]`, +Y up).
    pub fn cast_ray(&self, ndc: Vector2<f32>, projection: &Projection) -> Option<Ray> {
        let view_proj = projection.calc_matrix() * self.calc_matrix();
        let inverse = view_proj.invert()?;
        let unproject = |z: f32| {
            let clip = inverse * Vector4::new(ndc.x, ndc.y, z, 1.0);
            if clip.w.abs() <= f32::EPSILON {
                return None;
            }
            Some(Point3::from_vec(clip.truncate() / clip.w))
        };
        // wgpu depth range: 0 is the near plane, 1 the far plane
        let near = unproject(0.0)?;
        let far = unproject(1.0)?;
        let direction = far - near;
        if direction.magnitude2() <= f32::EPSILON {
            return None;
        }
        Some(Ray {
            origin: near,
            direction: direction.normalize(),
        })
    }
}

impl From<&CameraConfig> for Camera {
    fn from(cfg: &CameraConfig) -> Self {
        Camera::new(cfg.position, cfg.target)
    }
}

#[derive(Clone, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: f64, height: f64, fovy: F, znear: f32, zfar: f32) -> Self {
        let mut projection = Self {
            aspect: 1.0,
            fovy: fovy.into(),
            znear,
            zfar,
        };
        projection.resize(width, height);
        projection
    }

    /// Keep the aspect ratio equal to `width / height`; degenerate sizes are ignored.
    pub fn resize(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.aspect = (width / height) as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// A half-line in world or local space. `direction` is normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Transform the ray by an affine matrix. The direction is not re-normalized so that
    /// distances along the transformed ray map back to the same parameter `t`.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Ray {
        let origin = *matrix * self.origin.to_homogeneous();
        let direction = *matrix * self.direction.extend(0.0);
        Ray {
            origin: Point3::from_homogeneous(origin),
            direction: direction.truncate(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU side of the camera: the uniform, its buffer and bind group.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn write(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    #[test]
    fn aspect_matches_every_resize() {
        let mut projection = Projection::new(800.0, 600.0, Deg(75.0), 0.1, 1000.0);
        for (w, h) in [(1024.0, 768.0), (1.0, 1.0), (3840.0, 1600.0), (375.0, 812.0)] {
            projection.resize(w, h);
            assert_eq!(projection.aspect(), (w / h) as f32);
        }
    }

    #[test]
    fn zero_height_keeps_the_previous_aspect() {
        let mut projection = Projection::new(800.0, 400.0, Deg(75.0), 0.1, 1000.0);
        projection.resize(800.0, 0.0);
        assert_eq!(projection.aspect(), 2.0);
    }

    #[test]
    fn centre_ray_points_at_the_target() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 4.0), Point3::new(0.0, 0.0, 0.0));
        let projection = Projection::new(800.0, 600.0, Deg(75.0), 0.1, 1000.0);
        let ray = camera.cast_ray(Vector2::new(0.0, 0.0), &projection).unwrap();
        assert_close(ray.direction.x, 0.0);
        assert_close(ray.direction.y, 0.0);
        assert_close(ray.direction.z, -1.0);
        assert!((ray.origin.z - 3.9).abs() < 1e-3, "{}", ray.origin.z);
    }

    #[test]
    fn upper_half_of_the_screen_casts_upwards() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 4.0), Point3::new(0.0, 0.0, 0.0));
        let projection = Projection::new(800.0, 600.0, Deg(75.0), 0.1, 1000.0);
        let ray = camera.cast_ray(Vector2::new(0.0, 0.5), &projection).unwrap();
        assert!(ray.direction.y > 0.0);
    }

    #[test]
    fn transformed_ray_keeps_parameterisation() {
        let ray = Ray {
            origin: Point3::new(0.0, 0.0, 5.0),
            direction: Vector3::new(0.0, 0.0, -1.0),
        };
        let matrix = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0)) * Matrix4::from_scale(2.0);
        let moved = ray.transformed(&matrix);
        let expected = matrix * ray.at(1.5).to_homogeneous();
        let actual = moved.at(1.5);
        assert_close(actual.x, expected.x);
        assert_close(actual.y, expected.y);
        assert_close(actual.z, expected.z);
    }
}
