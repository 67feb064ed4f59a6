//! Screen-space overlays for inspecting offscreen textures.
//!
//! Both overlays start hidden; toggle them with [`SceneNode::set_visible`].

use cgmath::Vector3;

use crate::{
    data_structures::{
        mesh::Mesh,
        scene_graph::{ModelNode, SceneNode},
        texture::Texture,
    },
    error::Result,
    math,
    render::RenderBackend,
    shader::{ShaderKind, ShaderProgram},
};

/// A quad showing a depth texture, typically the shadow map.
pub fn show_texture(backend: &mut dyn RenderBackend, texture: Option<Texture>) -> Result<ModelNode> {
    let mut mesh = Mesh::overlay_quad();
    if let Some(texture) = texture {
        mesh.set_texture(texture);
    }
    overlay(backend, "show texture", mesh, ShaderKind::ShowTexture)
}

/// The six faces of a cube map unfolded into a cross.
pub fn flattened_cube(backend: &mut dyn RenderBackend, cube_map: Option<Texture>) -> Result<ModelNode> {
    let mut mesh = Mesh::flattened_cube();
    if let Some(texture) = cube_map {
        mesh.set_texture(texture);
    }
    overlay(backend, "flattened cube", mesh, ShaderKind::FlattenedCube)
}

fn overlay(backend: &mut dyn RenderBackend, name: &str, mesh: Mesh, kind: ShaderKind) -> Result<ModelNode> {
    let transform = math::pose(Vector3::new(0.0, 0.0, 1.0), 0.0, Vector3::new(1.0, 1.0, 1.0));
    let mut model = ModelNode::new(backend, name, transform, mesh, ShaderProgram::new(kind))?;
    model.set_visible(false);
    Ok(model)
}
