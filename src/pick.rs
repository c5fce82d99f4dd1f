//! Ray picking against the target mesh.
//!
//! A pointer position in normalized device coordinates is unprojected into a
//! world ray, moved into the target's local space and intersected with its CPU
//! triangles. Only one node is ever tested, so there is no acceleration
//! structure.

use cgmath::{Point3, SquareMatrix, Vector2};

use crate::{
    camera::{Camera, Projection, Ray},
    data_structures::{geometry::Geometry, scene_graph::SceneNode, transform::Transform},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// Distance from the ray origin in world units.
    pub distance: f32,
    pub point: Point3<f32>,
    /// `point` in the local space of the node that was hit.
    pub local_point: Point3<f32>,
}

/// Intersect a world-space ray with geometry placed by `world`.
pub fn intersect(ray: &Ray, geometry: &Geometry, world: &Transform) -> Option<Hit> {
    let Some(inverse) = world.to_matrix().invert() else {
        log::debug!("pick target has a singular transform");
        return None;
    };
    let local_ray = ray.transformed(&inverse);
    // the local direction keeps the world length, so `t` is shared by both rays
    let t = geometry.raycast(&local_ray)?;
    Some(Hit {
        distance: t,
        point: ray.at(t),
        local_point: local_ray.at(t),
    })
}

/// Cast a ray through `ndc` and test it against `target`.
pub fn pick(ndc: Vector2<f32>, camera: &Camera, projection: &Projection, target: &dyn SceneNode) -> Option<Hit> {
    let geometry = target.geometry()?;
    let ray = camera.cast_ray(ndc, projection)?;
    intersect(&ray, geometry, target.world_transform())
}

/// Pick and, on a hit, hand the local hit point to `place_marker`.
pub fn pick_and_mark(
    ndc: Vector2<f32>,
    camera: &Camera,
    projection: &Projection,
    target: &dyn SceneNode,
    place_marker: impl FnOnce(Point3<f32>),
) -> Option<Hit> {
    let hit = pick(ndc, camera, projection, target);
    match hit {
        Some(hit) => {
            log::debug!("hit at {:?} (local {:?})", hit.point, hit.local_point);
            place_marker(hit.local_point);
        }
        None => log::debug!("no hit at {:?}", ndc),
    }
    hit
}
