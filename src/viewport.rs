//! Device viewport state.
//!
//! The viewport is an explicit value owned by the render loop driver and
//! passed by reference to whoever needs it (projection, renderer sizing,
//! pointer normalization).

use cgmath::Vector2;
use winit::dpi::{PhysicalPosition, PhysicalSize};

/// Logical viewport size plus the device pixel ratio reported by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }

    /// Build the logical viewport from what winit reports: physical pixels and a scale factor.
    pub fn from_physical(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
        let scale_factor = if scale_factor > 0.0 { scale_factor } else { 1.0 };
        Self {
            width: f64::from(size.width) / scale_factor,
            height: f64::from(size.height) / scale_factor,
            pixel_ratio: scale_factor,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height <= 0.0 {
            return 1.0;
        }
        (self.width / self.height) as f32
    }

    /// The pixel ratio actually handed to the renderer: the device ratio capped at `max`.
    pub fn effective_pixel_ratio(&self, max: f64) -> f64 {
        self.pixel_ratio.min(max)
    }

    /// Backing surface size in device pixels for the capped pixel ratio.
    pub fn surface_size(&self, max_pixel_ratio: f64) -> PhysicalSize<u32> {
        let ratio = self.effective_pixel_ratio(max_pixel_ratio);
        PhysicalSize::new(
            (self.width * ratio).round().max(0.0) as u32,
            (self.height * ratio).round().max(0.0) as u32,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }

    /// Map client coordinates (logical px, origin top-left) to normalized device
    /// coordinates in `[-1, 1]` on both axes with +Y pointing up.
    pub fn normalize(&self, client_x: f64, client_y: f64) -> Vector2<f32> {
        if self.is_empty() {
            return Vector2::new(0.0, 0.0);
        }
        Vector2::new(
            (client_x / self.width * 2.0 - 1.0) as f32,
            (-(client_y / self.height) * 2.0 + 1.0) as f32,
        )
    }

    /// Same as [`normalize`](Self::normalize) for a position reported by winit in physical pixels.
    pub fn normalize_physical(&self, position: PhysicalPosition<f64>) -> Vector2<f32> {
        let logical = position.to_logical::<f64>(self.pixel_ratio);
        self.normalize(logical.x, logical.y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}
