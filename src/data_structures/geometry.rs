//! CPU-side mesh geometry.
//!
//! Builds the primitive meshes of the scene (box, plane, UV sphere) and keeps
//! their triangles around so the interaction layer can intersect rays with
//! them without touching the GPU. Texture coordinates follow wgpu's
//! convention: `(0, 0)` is the top-left texel.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Point3, Vector3};

use crate::{camera::Ray, data_structures::model::ModelVertex};

/// Below this determinant a ray is treated as parallel to the triangle.
const PARALLEL_EPSILON: f32 = 1e-7;

#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Axis-aligned box centred on the origin with one quad per face.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let mut geometry = Self::default();
        // (u axis, v axis, w axis, u direction, v direction, extent u, extent v, extent w)
        let faces = [
            (2, 1, 0, -1.0, -1.0, depth, height, width),
            (2, 1, 0, 1.0, -1.0, depth, height, -width),
            (0, 2, 1, 1.0, 1.0, width, depth, height),
            (0, 2, 1, 1.0, -1.0, width, depth, -height),
            (0, 1, 2, 1.0, -1.0, width, height, depth),
            (0, 1, 2, -1.0, -1.0, width, height, -depth),
        ];
        for (u, v, w, udir, vdir, extent_u, extent_v, extent_w) in faces {
            let base = geometry.vertices.len() as u32;
            for iy in 0..2 {
                for ix in 0..2 {
                    let mut position = [0.0; 3];
                    position[u] = (ix as f32 * extent_u - extent_u / 2.0) * udir;
                    position[v] = (iy as f32 * extent_v - extent_v / 2.0) * vdir;
                    position[w] = extent_w / 2.0;
                    let mut normal = [0.0; 3];
                    normal[w] = extent_w.signum();
                    geometry.vertices.push(ModelVertex {
                        position,
                        tex_coords: [ix as f32, iy as f32],
                        normal,
                    });
                }
            }
            let (a, b, c, d) = (base, base + 2, base + 3, base + 1);
            geometry.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
        geometry
    }

    /// Flat quad in the XY plane facing +Z.
    pub fn plane(width: f32, height: f32) -> Self {
        let mut vertices = Vec::with_capacity(4);
        for iy in 0..2 {
            for ix in 0..2 {
                let x = ix as f32 * width - width / 2.0;
                let y = iy as f32 * height - height / 2.0;
                vertices.push(ModelVertex {
                    position: [x, -y, 0.0],
                    tex_coords: [ix as f32, iy as f32],
                    normal: [0.0, 0.0, 1.0],
                });
            }
        }
        Self::new(vertices, vec![0, 2, 1, 2, 3, 1])
    }

    /// UV sphere; the poles sit on the Y axis.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let row = width_segments + 1;

        let mut vertices = Vec::with_capacity((row * (height_segments + 1)) as usize);
        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let (sin_theta, cos_theta) = (v * PI).sin_cos();
                let (sin_phi, cos_phi) = (u * 2.0 * PI).sin_cos();
                let normal = Vector3::new(-cos_phi * sin_theta, cos_theta, sin_phi * sin_theta);
                vertices.push(ModelVertex {
                    position: (normal * radius).into(),
                    tex_coords: [u, v],
                    normal: normal.into(),
                });
            }
        }

        let mut indices = Vec::new();
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                // the first and last rows collapse into the poles
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
        Self::new(vertices, indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle(&self, i: usize) -> Option<[Point3<f32>; 3]> {
        let corner = |k: usize| -> Option<Point3<f32>> {
            let index = *self.indices.get(i * 3 + k)? as usize;
            self.vertices.get(index).map(|v| v.position.into())
        };
        Some([corner(0)?, corner(1)?, corner(2)?])
    }

    /// Distance along `ray` to the nearest front-facing triangle.
    pub fn raycast(&self, ray: &Ray) -> Option<f32> {
        (0..self.triangle_count())
            .filter_map(|i| self.triangle(i))
            .filter_map(|[a, b, c]| intersect_triangle(ray, a, b, c, true))
            .min_by(|x, y| x.total_cmp(y))
    }
}

/// Möller–Trumbore ray/triangle intersection returning the ray parameter `t`.
///
/// Counter-clockwise triangles face the viewer; with `cull_back_faces` a ray
/// hitting the back of a triangle is a miss.
pub fn intersect_triangle(
    ray: &Ray,
    a: Point3<f32>,
    b: Point3<f32>,
    c: Point3<f32>,
    cull_back_faces: bool,
) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let h = ray.direction.cross(edge2);
    let det = edge1.dot(h);

    if det.abs() < PARALLEL_EPSILON || (cull_back_faces && det < 0.0) {
        return None;
    }

    let f = 1.0 / det;
    let s = ray.origin - a;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > PARALLEL_EPSILON).then_some(t)
}

/// Smooth per-vertex normals: each face normal is added to its three corners
/// weighted by the face area, then the sums are normalized.
pub fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); positions.len()];
    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let p0: Vector3<f32> = positions[i0].into();
        let p1: Vector3<f32> = positions[i1].into();
        let p2: Vector3<f32> = positions[i2].into();
        let face = (p1 - p0).cross(p2 - p0);
        sums[i0] += face;
        sums[i1] += face;
        sums[i2] += face;
    }
    sums.into_iter()
        .map(|n| {
            if n.magnitude2() > 0.0 {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

/// Index list for non-indexed triangle soup.
pub fn sequential_indices(vertex_count: usize) -> Vec<u32> {
    (0..vertex_count as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(origin: [f32; 3], direction: [f32; 3]) -> Ray {
        Ray {
            origin: origin.into(),
            direction: Vector3::from(direction).normalize(),
        }
    }

    #[test]
    fn cuboid_has_four_vertices_per_face() {
        let cube = Geometry::cuboid(1.0, 1.0, 1.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        for v in &cube.vertices {
            assert!(v.position.iter().all(|c| (c.abs() - 0.5).abs() < 1e-6));
        }
    }

    #[test]
    fn cuboid_faces_point_outwards() {
        let cube = Geometry::cuboid(2.0, 1.0, 3.0);
        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| Vector3::from(cube.vertices[tri[k] as usize].position));
            let winding = (b - a).cross(c - a);
            let centre = (a + b + c) / 3.0;
            assert!(winding.dot(centre) > 0.0, "inward face {:?}", tri);
        }
    }

    #[test]
    fn sphere_counts_and_radius() {
        let sphere = Geometry::sphere(1.0, 64, 64);
        assert_eq!(sphere.vertices.len(), 65 * 65);
        assert_eq!(sphere.indices.len(), 3 * 64 * (2 * 64 - 2));
        for v in &sphere.vertices {
            let p = Vector3::from(v.position);
            let n = Vector3::from(v.normal);
            assert!((p.magnitude() - 1.0).abs() < 1e-5);
            assert!((n.magnitude() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_faces_point_outwards() {
        let sphere = Geometry::sphere(2.0, 16, 12);
        for tri in sphere.indices.chunks_exact(3) {
            let [a, b, c] =
                [0, 1, 2].map(|k| Vector3::from(sphere.vertices[tri[k] as usize].position));
            let winding = (b - a).cross(c - a);
            assert!(winding.dot(a + b + c) > 0.0);
        }
    }

    #[test]
    fn ray_hits_the_near_side_of_a_sphere() {
        let sphere = Geometry::sphere(1.0, 64, 64);
        let t = sphere.raycast(&ray([0.01, 0.013, 5.0], [0.0, 0.0, -1.0])).unwrap();
        assert!((t - 4.0).abs() < 0.01, "{}", t);
    }

    #[test]
    fn ray_beside_the_sphere_misses() {
        let sphere = Geometry::sphere(1.0, 32, 16);
        assert!(sphere.raycast(&ray([2.0, 0.0, 5.0], [0.0, 0.0, -1.0])).is_none());
        assert!(sphere.raycast(&ray([0.0, 0.0, 5.0], [0.0, 0.0, 1.0])).is_none());
    }

    #[test]
    fn back_faces_can_be_culled() {
        let a = Point3::new(-1.0, -1.0, 0.0);
        let b = Point3::new(1.0, -1.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let front = ray([0.0, 0.0, 1.0], [0.0, 0.0, -1.0]);
        let back = ray([0.0, 0.0, -1.0], [0.0, 0.0, 1.0]);
        assert_eq!(intersect_triangle(&front, a, b, c, true), Some(1.0));
        assert_eq!(intersect_triangle(&back, a, b, c, true), None);
        assert_eq!(intersect_triangle(&back, a, b, c, false), Some(1.0));
    }

    #[test]
    fn computed_normals_match_flat_geometry() {
        let plane = Geometry::plane(2.0, 2.0);
        let positions: Vec<_> = plane.vertices.iter().map(|v| v.position).collect();
        for n in compute_normals(&positions, &plane.indices) {
            assert_eq!(n, [0.0, 0.0, 1.0]);
        }
    }
}
