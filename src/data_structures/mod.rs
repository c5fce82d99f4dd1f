//! Scene data: geometry, transforms, models, textures and the scene graph.
//!
//! - `geometry` generates primitive meshes on the CPU and ray casts them
//! - `transform` holds node transforms and their per-instance GPU layout
//! - `model` contains mesh and material definitions and the draw helpers
//! - `texture` wraps GPU textures and their creation
//! - `scene_graph` organizes nodes hierarchically

pub mod geometry;
pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
