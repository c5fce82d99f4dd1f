//! Node transforms and their GPU representation.
//!
//! A [`Transform`] is position, rotation (quaternion) and scale. Parent and
//! child transforms compose with `*`, and the world matrix of every node is
//! uploaded as an [`InstanceRaw`] into a one-element instance buffer.

use std::ops::Mul;

use cgmath::{
    Euler, Matrix, Matrix3, Matrix4, One, Point3, Quaternion, Rad, SquareMatrix, Transform as _,
    Vector3,
};

use crate::data_structures::model;

#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Set the rotation from Euler angles in radians (x, then y, then z).
    pub fn set_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quaternion::from(Euler::new(Rad(x), Rad(y), Rad(z)));
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn transform_point(&self, point: Point3<f32>) -> Point3<f32> {
        self.to_matrix().transform_point(point)
    }

    /// Map a point from the space this transform maps into back to its local space.
    pub fn inverse_transform_point(&self, point: Point3<f32>) -> Option<Point3<f32>> {
        self.to_matrix()
            .invert()
            .map(|inverse| inverse.transform_point(point))
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let model = self.to_matrix();
        // inverse-transpose keeps normals perpendicular under non-uniform scale
        let normal = model
            .invert()
            .map(|inverse| {
                let m = inverse.transpose();
                [
                    [m.x.x, m.x.y, m.x.z],
                    [m.y.x, m.y.y, m.y.z],
                    [m.z.x, m.z.y, m.z.z],
                ]
            })
            .unwrap_or_else(|| Matrix3::from(self.rotation).into());
        InstanceRaw {
            model: model.into(),
            normal,
        }
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Self::Output {
        let scaled_rhs_pos = Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Transform {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale: Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Self;

    fn mul(self, rhs: Transform) -> Self::Output {
        &self * &rhs
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform::at(position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the data stored on the GPU: the world matrix plus
 * the matrix used to bring normals into world space.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

/**
 * Stride layout: the 4x4 world matrix takes four vec4 slots (5..=8), the
 * 3x3 normal matrix three vec3 slots (9..=11).
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use cgmath::{InnerSpace, Rotation3};

    use super::*;

    fn assert_point(a: Point3<f32>, b: Point3<f32>) {
        assert!((a - b).magnitude() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn composition_matches_matrix_product() {
        let parent = Transform {
            position: Vector3::new(1.0, 2.0, 3.0),
            rotation: Quaternion::from_angle_y(Rad(FRAC_PI_2)),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let child = Transform::at(Vector3::new(0.5, 0.0, 0.0));
        let world = &parent * &child;
        let p = Point3::new(0.1, 0.2, 0.3);
        let expected = (parent.to_matrix() * child.to_matrix()).transform_point(p);
        assert_point(world.transform_point(p), expected);
    }

    #[test]
    fn inverse_point_undoes_transform() {
        let mut transform = Transform::at(Vector3::new(0.0, 1.0, -2.5));
        transform.set_euler(0.3, 1.2, 0.0);
        let local = Point3::new(0.2, 0.9, -0.1);
        let world = transform.transform_point(local);
        assert_point(transform.inverse_transform_point(world).unwrap(), local);
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        let transform = Transform {
            scale: Vector3::new(0.0, 1.0, 1.0),
            ..Default::default()
        };
        assert!(transform.inverse_transform_point(Point3::new(0.0, 0.0, 0.0)).is_none());
    }
}
