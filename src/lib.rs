//! orbit-viewer
//!
//! A small cross-platform (native and WASM) 3D scene viewer. It renders a
//! fixed scene with a shadow casting sun, ambient light and fog, loads a glTF
//! model and a texture in the background while a loading indicator shows the
//! progress, orbits the camera with damped mouse and touch controls, and marks
//! clicked points on a target sphere.
//!
//! High-level modules
//! - `config`: every tuned parameter, compiled in
//! - `viewport`: logical viewport size, pixel ratio and pointer normalization
//! - `camera` / `controls`: perspective camera, ray casting and orbit controls
//! - `data_structures`: geometry, transforms, models, textures and the scene graph
//! - `resources`: asset fetching, glTF parsing and GPU upload
//! - `loading`: the loading indicator overlay
//! - `scene`: the composed scene and its animation
//! - `pick`: pointer to ray to marker
//! - `debug`: live tweaking of shadow radius and fog distance
//! - `context` / `pipelines` / `render`: GPU state, pipelines and batching
//! - `driver`: the winit application and frame loop

pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod debug;
pub mod driver;
pub mod loading;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod viewport;

pub use driver::run;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    run().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}
