//! orbit-ngin
//!
//! A small multi-pass 3D rendering framework. Models form a scene graph and are
//! drawn with an explicitly assigned shader program; the scene renders a
//! shadow map, an optional environment cube map and a skybox before the main
//! pass. An orbit camera is driven by mouse and wheel input.
//!
//! High-level modules
//! - `camera`: orbit camera, projection and the input-driven controller
//! - `context`: the wgpu implementation of the render backend
//! - `data_structures`: meshes, materials, textures, cube maps, light, scene graph
//! - `flow`: the winit event loop and the [`flow::SceneFlow`] hooks
//! - `passes`: shadow map, environment map and skybox passes
//! - `pipelines`: WGSL sources and render pipelines per shader kind
//! - `render`: the [`render::RenderBackend`] seam and a recording backend for tests
//! - `resources`: image and OBJ loading
//! - `scene`: scene ownership and the per-frame pass order
//! - `shader`: shader kinds and uniform computation
//!

pub mod animation;
pub mod camera;
pub mod context;
pub mod data_structures;
pub mod debug;
pub mod error;
pub mod flow;
pub mod input;
pub mod math;
pub mod passes;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod shader;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use error::{NginError, Result};
pub use scene::{Scene, SceneConfig};
