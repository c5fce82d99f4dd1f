//! Orbit camera controls.
//!
//! Orbits, zooms and pans the camera around a target point. Input is
//! accumulated into spherical deltas; [`OrbitControls::update`] applies them
//! once per frame. With damping enabled only a `damping_factor` share of the
//! pending delta is applied per update and the rest decays geometrically,
//! which gives the camera its inertia.
//!
//! Mouse: left drag rotates, right drag pans, wheel zooms. Touch: one finger rotates.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, SquareMatrix, Vector2, Vector3};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
};

use crate::{
    camera::{Camera, Projection},
    config::ControlsConfig,
    viewport::Viewport,
};

const EPS: f32 = 1e-6;
// pixels per wheel "line" when the platform reports pixel deltas
const PIXELS_PER_LINE: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius <= EPS {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

#[derive(Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    config: ControlsConfig,
    spherical_delta: Spherical,
    scale: f32,
    pan_pixels: Vector2<f32>,
    pan_offset: Vector3<f32>,
    drag: Drag,
    cursor: Option<PhysicalPosition<f64>>,
    touch: Option<(u64, PhysicalPosition<f64>)>,
}

impl OrbitControls {
    pub fn new(config: ControlsConfig, target: Point3<f32>) -> Self {
        Self {
            target,
            config,
            spherical_delta: Spherical::default(),
            scale: 1.0,
            pan_pixels: Vector2::new(0.0, 0.0),
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            drag: Drag::None,
            cursor: None,
            touch: None,
        }
    }

    /// Queue a rotation for a pointer drag of `(dx, dy)` pixels on a viewport `height` pixels tall.
    pub fn rotate(&mut self, dx: f32, dy: f32, height: f32) {
        if height <= 0.0 {
            return;
        }
        let speed = self.config.rotate_speed;
        self.spherical_delta.theta -= 2.0 * PI * dx / height * speed;
        self.spherical_delta.phi -= 2.0 * PI * dy / height * speed;
    }

    /// Queue a zoom. Positive steps move the camera towards the target.
    pub fn zoom(&mut self, steps: f32) {
        let zoom_scale = 0.95_f32.powf(self.config.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= zoom_scale;
        } else if steps < 0.0 {
            self.scale /= zoom_scale;
        }
    }

    /// Queue a screen-space pan in pixels; converted to world units on the next update.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_pixels += Vector2::new(dx, dy) * self.config.pan_speed;
    }

    /// Feed a window event. Returns `true` when the event was used for camera movement.
    pub fn handle_window_events(&mut self, event: &WindowEvent, viewport: &Viewport) -> bool {
        let height = (viewport.height * viewport.pixel_ratio) as f32;
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) => Drag::Rotate,
                    (ElementState::Pressed, MouseButton::Right) => Drag::Pan,
                    (ElementState::Released, _) => Drag::None,
                    _ => self.drag,
                };
                self.drag != Drag::None
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace(*position);
                let Some(previous) = previous else {
                    return false;
                };
                let dx = (position.x - previous.x) as f32;
                let dy = (position.y - previous.y) as f32;
                match self.drag {
                    Drag::Rotate => self.rotate(dx, dy, height),
                    Drag::Pan => self.pan(dx, dy),
                    Drag::None => return false,
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_LINE) as f32,
                };
                self.zoom(steps);
                true
            }
            WindowEvent::Touch(touch) => match touch.phase {
                TouchPhase::Started => {
                    if self.touch.is_none() {
                        self.touch = Some((touch.id, touch.location));
                    }
                    true
                }
                TouchPhase::Moved => match self.touch {
                    Some((id, previous)) if id == touch.id => {
                        let dx = (touch.location.x - previous.x) as f32;
                        let dy = (touch.location.y - previous.y) as f32;
                        self.rotate(dx, dy, height);
                        self.touch = Some((id, touch.location));
                        true
                    }
                    _ => false,
                },
                TouchPhase::Ended | TouchPhase::Cancelled => {
                    if matches!(self.touch, Some((id, _)) if id == touch.id) {
                        self.touch = None;
                    }
                    false
                }
            },
            _ => false,
        }
    }

    /// Apply pending input to `camera`. Returns `true` if the camera moved.
    pub fn update(&mut self, camera: &mut Camera, projection: &Projection, viewport: &Viewport) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);
        let damping = if self.config.enable_damping {
            self.config.damping_factor
        } else {
            1.0
        };

        self.resolve_pan(camera, offset.magnitude(), projection, viewport);

        spherical.theta += self.spherical_delta.theta * damping;
        spherical.phi += self.spherical_delta.phi * damping;

        let (min_polar, max_polar) = self.config.polar_range();
        spherical.phi = spherical.phi.clamp(min_polar, max_polar).clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale)
            .clamp(self.config.min_distance, self.config.max_distance);

        self.target += self.pan_offset * damping;

        let position = self.target + spherical.to_offset();
        let moved = (position - camera.position).magnitude2() > EPS * EPS
            || (camera.target - self.target).magnitude2() > EPS * EPS;
        camera.position = position;
        camera.target = self.target;

        if self.config.enable_damping {
            self.spherical_delta.theta *= 1.0 - damping;
            self.spherical_delta.phi *= 1.0 - damping;
            self.pan_offset *= 1.0 - damping;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        moved
    }

    fn resolve_pan(&mut self, camera: &Camera, distance: f32, projection: &Projection, viewport: &Viewport) {
        if self.pan_pixels.magnitude2() <= EPS {
            return;
        }
        let height = (viewport.height * viewport.pixel_ratio) as f32;
        if height > 0.0 {
            // world units covered by the visible height at the target distance
            let target_distance = distance * (projection.fovy().0 / 2.0).tan();
            let Some(camera_to_world) = camera.calc_matrix().invert() else {
                self.pan_pixels = Vector2::new(0.0, 0.0);
                return;
            };
            let right = column(&camera_to_world, 0);
            let up = column(&camera_to_world, 1);
            self.pan_offset -= right * (2.0 * self.pan_pixels.x * target_distance / height);
            self.pan_offset += up * (2.0 * self.pan_pixels.y * target_distance / height);
        }
        self.pan_pixels = Vector2::new(0.0, 0.0);
    }
}

fn column(matrix: &Matrix4<f32>, idx: usize) -> Vector3<f32> {
    matrix[idx].truncate()
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;
    use crate::config::ViewerConfig;

    fn setup() -> (OrbitControls, Camera, Projection, Viewport) {
        let cfg = ViewerConfig::default();
        let controls = OrbitControls::new(cfg.controls.clone(), cfg.camera.target);
        let camera = Camera::from(&cfg.camera);
        let projection = Projection::new(800.0, 600.0, Deg(cfg.camera.fov_y_deg), 0.1, 1000.0);
        (controls, camera, projection, Viewport::new(800.0, 600.0, 1.0))
    }

    fn run(controls: &mut OrbitControls, camera: &mut Camera, projection: &Projection, viewport: &Viewport, frames: usize) {
        for _ in 0..frames {
            controls.update(camera, projection, viewport);
        }
    }

    #[test]
    fn idle_update_keeps_the_camera_in_place() {
        let (mut controls, mut camera, projection, viewport) = setup();
        let before = camera.position;
        assert!(!controls.update(&mut camera, &projection, &viewport));
        assert!((camera.position - before).magnitude() < 1e-4);
    }

    #[test]
    fn camera_never_goes_below_the_horizon() {
        let (mut controls, mut camera, projection, viewport) = setup();
        // dragging upwards increases phi towards the ground
        controls.rotate(0.0, -2000.0, 600.0);
        run(&mut controls, &mut camera, &projection, &viewport, 500);
        assert!(camera.position.y >= controls.target.y - 1e-4);
    }

    #[test]
    fn camera_can_reach_the_pole_but_not_beyond() {
        let (mut controls, mut camera, projection, viewport) = setup();
        controls.rotate(0.0, 5000.0, 600.0);
        run(&mut controls, &mut camera, &projection, &viewport, 500);
        let offset = camera.position - controls.target;
        assert!(offset.y > 0.0);
        assert!(offset.x.abs() < 1e-3 && offset.z.abs() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped_to_the_distance_limits() {
        let (mut controls, mut camera, projection, viewport) = setup();
        for _ in 0..200 {
            controls.zoom(-1.0);
            controls.update(&mut camera, &projection, &viewport);
        }
        assert!(((camera.position - controls.target).magnitude() - 20.0).abs() < 1e-3);
        for _ in 0..200 {
            controls.zoom(1.0);
            controls.update(&mut camera, &projection, &viewport);
        }
        assert!(((camera.position - controls.target).magnitude() - 2.0).abs() < 1e-3);
    }

    #[test]
    fn damping_applies_the_rotation_gradually() {
        let (mut controls, mut camera, projection, viewport) = setup();
        // 150px on a 600px viewport is a quarter turn to the left
        controls.rotate(150.0, 0.0, 600.0);
        controls.update(&mut camera, &projection, &viewport);
        let first = Spherical::from_offset(camera.position - controls.target).theta;
        assert!((first - (-PI / 2.0 * 0.025)).abs() < 1e-4, "{}", first);

        run(&mut controls, &mut camera, &projection, &viewport, 2000);
        let settled = Spherical::from_offset(camera.position - controls.target).theta;
        assert!((settled - (-PI / 2.0)).abs() < 1e-3, "{}", settled);
    }

    #[test]
    fn without_damping_the_rotation_is_applied_at_once() {
        let (_, mut camera, projection, viewport) = setup();
        let cfg = ControlsConfig {
            enable_damping: false,
            ..ViewerConfig::default().controls
        };
        let mut controls = OrbitControls::new(cfg, Point3::new(0.0, 0.0, 0.0));
        controls.rotate(150.0, 0.0, 600.0);
        controls.update(&mut camera, &projection, &viewport);
        let theta = Spherical::from_offset(camera.position - controls.target).theta;
        assert!((theta - (-PI / 2.0)).abs() < 1e-4);
        assert!(!controls.update(&mut camera, &projection, &viewport));
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let (mut controls, mut camera, projection, viewport) = setup();
        let distance = (camera.position - controls.target).magnitude();
        controls.pan(-100.0, 0.0);
        run(&mut controls, &mut camera, &projection, &viewport, 2000);
        assert!(controls.target.x > 0.0);
        assert!(((camera.position - controls.target).magnitude() - distance).abs() < 1e-3);
    }

    #[test]
    fn spherical_round_trip_preserves_offset() {
        let offset = Vector3::new(1.0, 2.0, -3.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).magnitude() < 1e-5);
    }
}
