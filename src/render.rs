//! The graphics-API seam.
//!
//! Everything the scene does on the GPU goes through [`RenderBackend`]: resource
//! creation returns small copyable handles, and drawing is a short state
//! machine (`begin_pass`, program, uniforms, textures, `draw_indexed`,
//! `end_pass`). [`crate::context::Context`] implements it on top of wgpu;
//! [`RecordingBackend`] implements it by logging every call, which is what the
//! headless tests use.
//!
//! # Key types
//!
//! - [`Target`] names where a pass renders (screen, offscreen depth, cube face)
//! - [`TextureUnit`] is the fixed slot a texture is sampled from
//! - [`BoundTextures`] binds textures for the lifetime of a draw and unbinds them on drop
//! - [`FrameContext`] carries the per-pass matrices and inputs down the scene graph

use std::ops::{Deref, DerefMut};

use cgmath::Matrix4;
use image::RgbaImage;

use crate::{
    data_structures::{cube_map::CubeFace, light::LightSource, mesh::Mesh, texture::Texture},
    error::{NginError, Result},
    shader::{ShaderKind, ShaderProgram, UniformBlock},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(pub u32);

/// Where a render pass draws to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The window surface. Cleared once per frame by [`RenderBackend::clear`].
    Screen,
    /// An offscreen depth target (shadow map). Cleared when entered.
    Offscreen(TargetId),
    /// One face of an offscreen cube target. Cleared when entered.
    CubeFace { target: TargetId, face: CubeFace },
}

/// Texture slots agreed between the shader sources and the binding logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureUnit {
    /// `sampler`: a 2D colour texture.
    Diffuse = 0,
    /// `sampler_cube`: a cube map.
    Cube = 1,
    /// `shadow_map`: a depth texture.
    Shadow = 2,
}

pub trait RenderBackend {
    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<MeshId>;

    fn upload_texture(&mut self, name: &str, image: &RgbaImage) -> Result<TextureId>;

    /// Faces are given in [`CubeFace::ALL`] order.
    fn upload_cube_map(&mut self, name: &str, faces: [&RgbaImage; 6]) -> Result<TextureId>;

    /// Creates a square depth target and the texture that samples it.
    fn create_depth_target(&mut self, name: &str, size: u32) -> Result<(TargetId, TextureId)>;

    /// Creates a cube colour target (six renderable faces) and its cube texture.
    fn create_cube_target(&mut self, name: &str, size: u32) -> Result<(TargetId, TextureId)>;

    /// Compiles and links a program. Failure is fatal to the caller.
    fn link_program(&mut self, program: &ShaderProgram) -> Result<ProgramId>;

    fn release_mesh(&mut self, mesh: MeshId);

    fn release_texture(&mut self, texture: TextureId);

    fn window_size(&self) -> (u32, u32);

    /// Clears colour and depth of `target` before its first pass this frame.
    fn clear(&mut self, target: Target);

    fn begin_pass(&mut self, target: Target);

    fn end_pass(&mut self);

    fn bind_program(&mut self, program: ProgramId);

    fn set_uniforms(&mut self, uniforms: &UniformBlock);

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId);

    fn unbind_texture(&mut self, unit: TextureUnit);

    fn set_depth_write(&mut self, enabled: bool);

    fn draw_indexed(&mut self, mesh: MeshId, index_count: u32);

    fn present(&mut self);
}

/// Textures bound for the duration of a draw.
///
/// Dereferences to the backend so the draw can be issued through the guard;
/// every texture is unbound, in reverse order, when the guard drops.
pub struct BoundTextures<'a> {
    backend: &'a mut dyn RenderBackend,
    units: Vec<TextureUnit>,
}

impl<'a> BoundTextures<'a> {
    pub fn bind(backend: &'a mut dyn RenderBackend, bindings: &[(TextureUnit, TextureId)]) -> Self {
        let units = bindings
            .iter()
            .map(|&(unit, texture)| {
                backend.bind_texture(unit, texture);
                unit
            })
            .collect();
        Self { backend, units }
    }
}

impl<'a> Deref for BoundTextures<'a> {
    type Target = dyn RenderBackend + 'a;

    fn deref(&self) -> &Self::Target {
        self.backend
    }
}

impl<'a> DerefMut for BoundTextures<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend
    }
}

impl Drop for BoundTextures<'_> {
    fn drop(&mut self) {
        for unit in self.units.iter().rev() {
            self.backend.unbind_texture(*unit);
        }
    }
}

/// Shadow map output consumed by the main pass.
#[derive(Clone, Debug)]
pub struct ShadowInput {
    /// `P_light * V_light`, in wgpu clip space.
    pub matrix: Matrix4<f32>,
    pub texture: Texture,
}

/// Per-pass state handed down the scene graph.
pub struct FrameContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub light: &'a LightSource,
    pub shadow: Option<&'a ShadowInput>,
    pub environment: Option<&'a Texture>,
    /// Replaces every model's own program, e.g. the depth-only program of the
    /// shadow pass.
    pub program_override: Option<&'a ShaderProgram>,
    /// Whether screen-space overlays are drawn. Off for auxiliary targets.
    pub overlays: bool,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        backend: &'a mut dyn RenderBackend,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        light: &'a LightSource,
    ) -> Self {
        Self {
            backend,
            view,
            projection,
            light,
            shadow: None,
            environment: None,
            program_override: None,
            overlays: true,
        }
    }
}

/// One backend call as seen by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    Clear(Target),
    BeginPass(Target),
    EndPass,
    BindProgram(ProgramId),
    SetUniforms(UniformBlock),
    BindTexture(TextureUnit, TextureId),
    UnbindTexture(TextureUnit),
    DepthWrite(bool),
    Draw { mesh: MeshId, index_count: u32 },
    Present,
}

/// A draw with the state that was current when it was issued.
#[derive(Clone, Debug)]
pub struct DrawRecord {
    pub target: Option<Target>,
    pub program: Option<ProgramId>,
    pub kind: Option<ShaderKind>,
    pub uniforms: Option<UniformBlock>,
    pub textures: Vec<(TextureUnit, TextureId)>,
    pub depth_write: bool,
    pub mesh: MeshId,
    pub mesh_name: String,
    pub index_count: u32,
}

/// A backend that performs no GPU work and records every call.
///
/// Useful headless and in tests: resource creation hands out sequential ids,
/// frame calls are appended to [`calls`](Self::calls) and each draw is
/// captured together with the state it saw.
pub struct RecordingBackend {
    calls: Vec<GpuCall>,
    draws: Vec<DrawRecord>,
    programs: Vec<(String, ShaderKind)>,
    meshes: Vec<String>,
    textures: Vec<String>,
    targets: u32,
    rejected_programs: Vec<String>,
    window: (u32, u32),
    current_target: Option<Target>,
    current_program: Option<ProgramId>,
    current_uniforms: Option<UniformBlock>,
    bound: Vec<(TextureUnit, TextureId)>,
    depth_write: bool,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            calls: Vec::new(),
            draws: Vec::new(),
            programs: Vec::new(),
            meshes: Vec::new(),
            textures: Vec::new(),
            targets: 0,
            rejected_programs: Vec::new(),
            window: (width, height),
            current_target: None,
            current_program: None,
            current_uniforms: None,
            bound: Vec::new(),
            depth_write: true,
        }
    }

    /// Makes linking a program with this name fail.
    pub fn reject_program(&mut self, name: impl Into<String>) {
        self.rejected_programs.push(name.into());
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn draws_into(&self, target: Target) -> Vec<&DrawRecord> {
        self.draws
            .iter()
            .filter(|draw| draw.target == Some(target))
            .collect()
    }

    pub fn passes(&self) -> Vec<Target> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::BeginPass(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn program_kind(&self, program: ProgramId) -> Option<ShaderKind> {
        self.programs.get(program.0 as usize).map(|(_, kind)| *kind)
    }

    pub fn texture_name(&self, texture: TextureId) -> Option<&str> {
        self.textures.get(texture.0 as usize).map(String::as_str)
    }

    /// Names of textures that have been created but not released.
    pub fn live_textures(&self) -> usize {
        self.textures.iter().filter(|name| !name.is_empty()).count()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.iter().filter(|name| !name.is_empty()).count()
    }

    /// Forgets the frame log, keeping created resources.
    pub fn reset_frame_log(&mut self) {
        self.calls.clear();
        self.draws.clear();
    }

    fn next_texture(&mut self, name: &str) -> TextureId {
        self.textures.push(name.to_string());
        TextureId(self.textures.len() as u32 - 1)
    }
}

impl RenderBackend for RecordingBackend {
    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<MeshId> {
        self.meshes.push(mesh.name.clone());
        Ok(MeshId(self.meshes.len() as u32 - 1))
    }

    fn upload_texture(&mut self, name: &str, _image: &RgbaImage) -> Result<TextureId> {
        Ok(self.next_texture(name))
    }

    fn upload_cube_map(&mut self, name: &str, _faces: [&RgbaImage; 6]) -> Result<TextureId> {
        Ok(self.next_texture(name))
    }

    fn create_depth_target(&mut self, name: &str, _size: u32) -> Result<(TargetId, TextureId)> {
        self.targets += 1;
        Ok((TargetId(self.targets - 1), self.next_texture(name)))
    }

    fn create_cube_target(&mut self, name: &str, _size: u32) -> Result<(TargetId, TextureId)> {
        self.targets += 1;
        Ok((TargetId(self.targets - 1), self.next_texture(name)))
    }

    fn link_program(&mut self, program: &ShaderProgram) -> Result<ProgramId> {
        if self.rejected_programs.iter().any(|name| name == program.name()) {
            return Err(NginError::shader(program.name(), "rejected by backend"));
        }
        self.programs.push((program.name().to_string(), program.kind()));
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn release_mesh(&mut self, mesh: MeshId) {
        if let Some(name) = self.meshes.get_mut(mesh.0 as usize) {
            name.clear();
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(name) = self.textures.get_mut(texture.0 as usize) {
            name.clear();
        }
    }

    fn window_size(&self) -> (u32, u32) {
        self.window
    }

    fn clear(&mut self, target: Target) {
        self.calls.push(GpuCall::Clear(target));
    }

    fn begin_pass(&mut self, target: Target) {
        self.current_target = Some(target);
        self.depth_write = true;
        self.calls.push(GpuCall::BeginPass(target));
    }

    fn end_pass(&mut self) {
        self.current_target = None;
        self.current_program = None;
        self.current_uniforms = None;
        self.calls.push(GpuCall::EndPass);
    }

    fn bind_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.calls.push(GpuCall::BindProgram(program));
    }

    fn set_uniforms(&mut self, uniforms: &UniformBlock) {
        self.current_uniforms = Some(uniforms.clone());
        self.calls.push(GpuCall::SetUniforms(uniforms.clone()));
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId) {
        self.bound.retain(|(bound_unit, _)| *bound_unit != unit);
        self.bound.push((unit, texture));
        self.calls.push(GpuCall::BindTexture(unit, texture));
    }

    fn unbind_texture(&mut self, unit: TextureUnit) {
        self.bound.retain(|(bound_unit, _)| *bound_unit != unit);
        self.calls.push(GpuCall::UnbindTexture(unit));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
        self.calls.push(GpuCall::DepthWrite(enabled));
    }

    fn draw_indexed(&mut self, mesh: MeshId, index_count: u32) {
        let record = DrawRecord {
            target: self.current_target,
            program: self.current_program,
            kind: self.current_program.and_then(|program| self.program_kind(program)),
            uniforms: self.current_uniforms.clone(),
            textures: self.bound.clone(),
            depth_write: self.depth_write,
            mesh,
            mesh_name: self.meshes.get(mesh.0 as usize).cloned().unwrap_or_default(),
            index_count,
        };
        self.draws.push(record);
        self.calls.push(GpuCall::Draw { mesh, index_count });
    }

    fn present(&mut self) {
        self.calls.push(GpuCall::Present);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_textures_unbind_in_reverse_on_drop() {
        let mut backend = RecordingBackend::new(8, 8);
        {
            let mut bound = BoundTextures::bind(
                &mut backend,
                &[
                    (TextureUnit::Diffuse, TextureId(3)),
                    (TextureUnit::Shadow, TextureId(4)),
                ],
            );
            bound.draw_indexed(MeshId(0), 6);
        }
        assert_eq!(
            backend.calls(),
            &[
                GpuCall::BindTexture(TextureUnit::Diffuse, TextureId(3)),
                GpuCall::BindTexture(TextureUnit::Shadow, TextureId(4)),
                GpuCall::Draw {
                    mesh: MeshId(0),
                    index_count: 6
                },
                GpuCall::UnbindTexture(TextureUnit::Shadow),
                GpuCall::UnbindTexture(TextureUnit::Diffuse),
            ]
        );
        assert_eq!(backend.draws()[0].textures.len(), 2);
    }

    #[test]
    fn released_resources_are_no_longer_live() {
        let mut backend = RecordingBackend::new(8, 8);
        let image = RgbaImage::new(1, 1);
        let a = backend.upload_texture("a", &image).unwrap();
        backend.upload_texture("b", &image).unwrap();
        backend.release_texture(a);
        assert_eq!(backend.live_textures(), 1);
        assert_eq!(backend.texture_name(a), Some(""));
    }
}
