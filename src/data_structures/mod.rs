//! Engine data structures: meshes, materials, textures, lights and the scene graph.
//!
//! - `mesh` holds CPU-side geometry and the built-in primitives
//! - `model` contains the GPU vertex layout and Phong materials
//! - `texture` wraps backend texture handles and the wgpu textures behind them
//! - `cube_map` loads, uploads and samples six-face cube maps
//! - `light` is the point light shared by shading and shadow mapping
//! - `scene_graph` defines drawable leaves and composites

pub mod cube_map;
pub mod light;
pub mod mesh;
pub mod model;
pub mod scene_graph;
pub mod texture;
