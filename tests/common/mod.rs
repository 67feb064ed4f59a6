#![allow(dead_code)]

use cgmath::{Matrix4, SquareMatrix};
use image::{Rgba, RgbaImage};
use orbit_ngin::{
    data_structures::{cube_map::CubeMap, mesh::Mesh, scene_graph::ModelNode},
    render::RenderBackend,
    shader::{ShaderKind, ShaderProgram},
};

pub fn solid(colour: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(4, 4, Rgba(colour))
}

/// A cube map whose faces are red, green, blue, yellow, cyan and magenta.
pub fn coloured_cube_map() -> CubeMap {
    CubeMap::from_faces(
        "coloured",
        [
            solid([255, 0, 0, 255]),
            solid([0, 255, 0, 255]),
            solid([0, 0, 255, 255]),
            solid([255, 255, 0, 255]),
            solid([0, 255, 255, 255]),
            solid([255, 0, 255, 255]),
        ],
    )
}

pub fn model(backend: &mut dyn RenderBackend, name: &str, mesh: Mesh, kind: ShaderKind) -> Box<ModelNode> {
    let node = ModelNode::new(backend, name, Matrix4::identity(), mesh, ShaderProgram::new(kind))
        .expect("model construction");
    Box::new(node)
}
