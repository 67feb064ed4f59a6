//! Shader programs and their uniforms.
//!
//! A [`ShaderProgram`] is one of a fixed set of [`ShaderKind`]s plus the list of
//! uniform names it was asked to provide. Binding a program for a draw computes
//! exactly those uniforms from the frame matrices, light and material.
//!
//! # Key types
//!
//! - [`ShaderKind`]: the shading model, which also decides the texture units sampled
//! - [`UniformInputs`]: everything a uniform value may be derived from
//! - [`UniformBlock`]: the named values for one draw, packed to [`UniformsRaw`] for the GPU

use cgmath::{Matrix4, SquareMatrix, Vector4};

use crate::{
    data_structures::{light::LightSource, model::Material},
    error::{NginError, Result},
    math,
    render::{ProgramId, RenderBackend, TextureUnit},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Unlit material colour, optionally textured.
    Flat,
    /// Blinn-Phong lighting.
    Phong,
    /// Phong lighting attenuated by the shadow map.
    ShadowMapping,
    /// Full-intensity colour, used for light gizmos.
    MaxBrightness,
    /// Reflection lookup into the environment cube map.
    Environment,
    /// Cube map sampled by object-space direction.
    Skybox,
    /// Debug overlay showing a depth texture.
    ShowTexture,
    /// Debug overlay showing the six faces of a cube map unfolded.
    FlattenedCube,
    /// Depth-only rendering from the light.
    ShadowDepth,
}

const MATRICES: [&str; 4] = ["PVM", "VM", "V", "VT"];
const MATERIAL: [&str; 5] = ["Ka", "Kd", "Ks", "Ns", "alpha"];
const LIGHT: [&str; 4] = ["light", "Ia", "Id", "Is"];

impl ShaderKind {
    pub const ALL: [ShaderKind; 9] = [
        ShaderKind::Flat,
        ShaderKind::Phong,
        ShaderKind::ShadowMapping,
        ShaderKind::MaxBrightness,
        ShaderKind::Environment,
        ShaderKind::Skybox,
        ShaderKind::ShowTexture,
        ShaderKind::FlattenedCube,
        ShaderKind::ShadowDepth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShaderKind::Flat => "flat",
            ShaderKind::Phong => "phong",
            ShaderKind::ShadowMapping => "shadow_mapping",
            ShaderKind::MaxBrightness => "max_brightness",
            ShaderKind::Environment => "environment",
            ShaderKind::Skybox => "skybox",
            ShaderKind::ShowTexture => "show_texture",
            ShaderKind::FlattenedCube => "flattened_cube",
            ShaderKind::ShadowDepth => "shadow_depth",
        }
    }

    /// Uniforms a program of this kind is created with.
    pub fn default_uniforms(&self) -> Vec<&'static str> {
        let mut names = vec!["PVM"];
        match self {
            ShaderKind::Flat | ShaderKind::MaxBrightness => {
                names.extend(["Kd", "alpha", "has_texture", "sampler"]);
            }
            ShaderKind::Phong => {
                names.extend(["VM", "VT", "mode", "has_texture", "sampler"]);
                names.extend(MATERIAL);
                names.extend(LIGHT);
            }
            ShaderKind::ShadowMapping => {
                names.extend(["VM", "VT", "mode", "has_texture", "sampler"]);
                names.extend(MATERIAL);
                names.extend(LIGHT);
                names.extend(["shadow_PVM", "shadow_map"]);
            }
            ShaderKind::Environment => {
                names.extend(["VM", "VT", "V", "alpha", "Kd", "sampler_cube"]);
            }
            ShaderKind::Skybox | ShaderKind::FlattenedCube => names.push("sampler_cube"),
            ShaderKind::ShowTexture => names.push("shadow_map"),
            ShaderKind::ShadowDepth => {}
        }
        names
    }

    /// Every uniform name a program of this kind accepts.
    pub fn supports(&self, uniform: &str) -> bool {
        let common = MATRICES.contains(&uniform) || uniform == "mode";
        let lit = MATERIAL.contains(&uniform) || LIGHT.contains(&uniform);
        match self {
            ShaderKind::Flat | ShaderKind::MaxBrightness | ShaderKind::Phong => {
                common || lit || matches!(uniform, "has_texture" | "sampler")
            }
            ShaderKind::ShadowMapping => {
                common
                    || lit
                    || matches!(uniform, "has_texture" | "sampler" | "shadow_PVM" | "shadow_map")
            }
            ShaderKind::Environment => {
                common || MATERIAL.contains(&uniform) || uniform == "sampler_cube"
            }
            ShaderKind::Skybox | ShaderKind::FlattenedCube => common || uniform == "sampler_cube",
            ShaderKind::ShowTexture => common || uniform == "shadow_map",
            ShaderKind::ShadowDepth => uniform == "PVM",
        }
    }

    /// Texture units that must be bound for a draw to be meaningful.
    pub fn required_units(&self) -> &'static [TextureUnit] {
        match self {
            ShaderKind::ShadowMapping | ShaderKind::ShowTexture => &[TextureUnit::Shadow],
            ShaderKind::Environment | ShaderKind::Skybox | ShaderKind::FlattenedCube => {
                &[TextureUnit::Cube]
            }
            _ => &[],
        }
    }

    /// Texture units bound when available but not required.
    pub fn optional_units(&self) -> &'static [TextureUnit] {
        match self {
            ShaderKind::Flat
            | ShaderKind::Phong
            | ShaderKind::ShadowMapping
            | ShaderKind::MaxBrightness => &[TextureUnit::Diffuse],
            _ => &[],
        }
    }

    /// Kinds whose vertices are already in NDC. They only make sense in the
    /// main pass.
    pub fn is_screen_space(&self) -> bool {
        matches!(self, ShaderKind::ShowTexture | ShaderKind::FlattenedCube)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Mat4(Matrix4<f32>),
    Mat3(cgmath::Matrix3<f32>),
    Vec4(Vector4<f32>),
    Float(f32),
    Int(i32),
}

/// Uniform values for one draw, keyed by name in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformBlock {
    values: Vec<(&'static str, UniformValue)>,
}

impl UniformBlock {
    pub fn set(&mut self, name: &'static str, value: UniformValue) {
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| *value)
    }

    pub fn mat4(&self, name: &str) -> Option<Matrix4<f32>> {
        match self.get(name)? {
            UniformValue::Mat4(m) => Some(m),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Packs the block into the fixed layout every WGSL program declares.
    /// Names the block does not carry keep neutral defaults.
    pub fn to_raw(&self) -> UniformsRaw {
        let mut raw = UniformsRaw::default();
        for (name, value) in &self.values {
            match (*name, *value) {
                ("PVM", UniformValue::Mat4(m)) => raw.pvm = m.into(),
                ("VM", UniformValue::Mat4(m)) => raw.vm = m.into(),
                ("V", UniformValue::Mat4(m)) => raw.v = m.into(),
                ("shadow_PVM", UniformValue::Mat4(m)) => raw.shadow_pvm = m.into(),
                ("VT", UniformValue::Mat3(m)) => {
                    raw.vt = [
                        m.x.extend(0.0).into(),
                        m.y.extend(0.0).into(),
                        m.z.extend(0.0).into(),
                    ]
                }
                ("light", UniformValue::Vec4(v)) => raw.light = v.into(),
                ("Ia", UniformValue::Vec4(v)) => raw.ia = v.into(),
                ("Id", UniformValue::Vec4(v)) => raw.id = v.into(),
                ("Is", UniformValue::Vec4(v)) => raw.is = v.into(),
                ("Ka", UniformValue::Vec4(v)) => raw.ka = v.into(),
                ("Kd", UniformValue::Vec4(v)) => raw.kd = v.into(),
                ("Ks", UniformValue::Vec4(v)) => raw.ks = v.into(),
                ("Ns", UniformValue::Float(f)) => raw.ns = f,
                ("alpha", UniformValue::Float(f)) => raw.alpha = f,
                ("mode", UniformValue::Int(i)) => raw.mode = i,
                ("has_texture", UniformValue::Int(i)) => raw.has_texture = i,
                // Sampler units are fixed by the bind group layout.
                ("sampler" | "sampler_cube" | "shadow_map", UniformValue::Int(_)) => {}
                (other, value) => log::warn!("uniform '{other}' has unexpected value {value:?}"),
            }
        }
        raw
    }
}

/// GPU layout of [`UniformBlock`]. Mirrors `Uniforms` in the WGSL sources.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UniformsRaw {
    pub pvm: [[f32; 4]; 4],
    pub vm: [[f32; 4]; 4],
    pub v: [[f32; 4]; 4],
    pub shadow_pvm: [[f32; 4]; 4],
    pub vt: [[f32; 4]; 3],
    pub light: [f32; 4],
    pub ia: [f32; 4],
    pub id: [f32; 4],
    pub is: [f32; 4],
    pub ka: [f32; 4],
    pub kd: [f32; 4],
    pub ks: [f32; 4],
    pub ns: f32,
    pub alpha: f32,
    pub mode: i32,
    pub has_texture: i32,
}

impl Default for UniformsRaw {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::identity().into();
        Self {
            pvm: identity,
            vm: identity,
            v: identity,
            shadow_pvm: identity,
            vt: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            light: [0.0, 0.0, 0.0, 1.0],
            ia: [0.0; 4],
            id: [0.0; 4],
            is: [0.0; 4],
            ka: [0.0; 4],
            kd: [1.0; 4],
            ks: [0.0; 4],
            ns: 1.0,
            alpha: 1.0,
            mode: 0,
            has_texture: 0,
        }
    }
}

/// Everything a uniform value can be derived from.
pub struct UniformInputs<'a> {
    pub projection: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub model: Matrix4<f32>,
    pub light: &'a LightSource,
    pub material: &'a Material,
    pub has_texture: bool,
    /// `P_light * V_light`, when a shadow map is available.
    pub shadow: Option<Matrix4<f32>>,
}

#[derive(Clone, Debug)]
pub struct ShaderProgram {
    name: String,
    kind: ShaderKind,
    uniforms: Vec<&'static str>,
    mode: i32,
    id: Option<ProgramId>,
}

impl ShaderProgram {
    pub fn new(kind: ShaderKind) -> Self {
        Self::named(kind.name(), kind)
    }

    pub fn named(name: impl Into<String>, kind: ShaderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            uniforms: kind.default_uniforms(),
            mode: 0,
            id: None,
        }
    }

    /// Selects a shading variant (e.g. which Phong terms to show).
    pub fn with_mode(mut self, mode: i32) -> Self {
        self.mode = mode;
        self
    }

    /// Declares an additional uniform. Names the kind cannot provide are rejected.
    pub fn add_uniform(&mut self, name: &str) -> Result<()> {
        if !self.kind.supports(name) {
            return Err(NginError::shader(
                &self.name,
                format!("uniform '{name}' is not available in {} programs", self.kind.name()),
            ));
        }
        if let Some(known) = ALL_UNIFORMS.iter().find(|known| **known == name) {
            if !self.uniforms.contains(known) {
                self.uniforms.push(known);
            }
        }
        Ok(())
    }

    pub fn link(&mut self, backend: &mut dyn RenderBackend) -> Result<ProgramId> {
        if let Some(id) = self.id {
            return Ok(id);
        }
        let id = backend.link_program(self)?;
        log::debug!("linked program '{}' ({:?})", self.name, self.kind);
        self.id = Some(id);
        Ok(id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn mode(&self) -> i32 {
        self.mode
    }

    pub fn id(&self) -> Option<ProgramId> {
        self.id
    }

    pub fn uniforms(&self) -> &[&'static str] {
        &self.uniforms
    }

    /// Computes the declared uniforms for one draw.
    pub fn bind(&self, inputs: &UniformInputs) -> UniformBlock {
        let mut block = UniformBlock::default();
        let vm = inputs.view * inputs.model;
        for &name in &self.uniforms {
            let value = match name {
                "PVM" => UniformValue::Mat4(inputs.projection * vm),
                "VM" => UniformValue::Mat4(vm),
                "V" => UniformValue::Mat4(inputs.view),
                "VT" => UniformValue::Mat3(math::normal_matrix(&vm)),
                "mode" => UniformValue::Int(self.mode),
                "alpha" => UniformValue::Float(inputs.material.alpha),
                "Ka" => UniformValue::Vec4(inputs.material.ka.extend(1.0)),
                "Kd" => UniformValue::Vec4(inputs.material.kd.extend(1.0)),
                "Ks" => UniformValue::Vec4(inputs.material.ks.extend(1.0)),
                "Ns" => UniformValue::Float(inputs.material.ns),
                "light" => UniformValue::Vec4(
                    inputs.view * inputs.light.position.to_homogeneous(),
                ),
                "Ia" => UniformValue::Vec4(inputs.light.ambient.extend(1.0)),
                "Id" => UniformValue::Vec4(inputs.light.diffuse.extend(1.0)),
                "Is" => UniformValue::Vec4(inputs.light.specular.extend(1.0)),
                "has_texture" => UniformValue::Int(inputs.has_texture as i32),
                "shadow_PVM" => UniformValue::Mat4(
                    inputs.shadow.unwrap_or_else(Matrix4::identity) * inputs.model,
                ),
                "sampler" => UniformValue::Int(TextureUnit::Diffuse as i32),
                "sampler_cube" => UniformValue::Int(TextureUnit::Cube as i32),
                "shadow_map" => UniformValue::Int(TextureUnit::Shadow as i32),
                _ => continue,
            };
            block.set(name, value);
        }
        block
    }
}

const ALL_UNIFORMS: [&str; 19] = [
    "PVM",
    "VM",
    "V",
    "VT",
    "mode",
    "alpha",
    "Ka",
    "Kd",
    "Ks",
    "Ns",
    "light",
    "Ia",
    "Id",
    "Is",
    "has_texture",
    "shadow_PVM",
    "sampler",
    "sampler_cube",
    "shadow_map",
];

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Point3, Vector3};

    fn inputs<'a>(light: &'a LightSource, material: &'a Material) -> UniformInputs<'a> {
        UniformInputs {
            projection: math::perspective(1.0, 1.0, 1.0, 50.0),
            view: math::translation(Vector3::new(0.0, 0.0, -5.0)),
            model: math::translation(Vector3::new(1.0, 0.0, 0.0)),
            light,
            material,
            has_texture: false,
            shadow: None,
        }
    }

    #[test]
    fn unknown_uniform_is_rejected() {
        let mut program = ShaderProgram::new(ShaderKind::Skybox);
        assert!(matches!(
            program.add_uniform("shadow_PVM"),
            Err(NginError::ShaderLink { .. })
        ));
        assert!(program.add_uniform("does_not_exist").is_err());
        assert!(program.add_uniform("VM").is_ok());
        assert!(program.uniforms().contains(&"VM"));
    }

    #[test]
    fn bind_computes_pvm_in_order() {
        let light = LightSource::default();
        let material = Material::default();
        let inputs = inputs(&light, &material);
        let block = ShaderProgram::new(ShaderKind::Phong).bind(&inputs);
        let expected = inputs.projection * inputs.view * inputs.model;
        assert_relative_eq!(block.mat4("PVM").unwrap(), expected, epsilon = 1e-6);
        assert_relative_eq!(
            block.mat4("VM").unwrap(),
            inputs.view * inputs.model,
            epsilon = 1e-6
        );
    }

    #[test]
    fn light_is_sent_in_view_space() {
        let light = LightSource::new(Point3::new(0.0, 3.0, 0.0));
        let material = Material::default();
        let block = ShaderProgram::new(ShaderKind::Phong).bind(&inputs(&light, &material));
        assert_eq!(
            block.get("light"),
            Some(UniformValue::Vec4(Vector4::new(0.0, 3.0, -5.0, 1.0)))
        );
    }

    #[test]
    fn depth_program_only_carries_pvm() {
        let light = LightSource::default();
        let material = Material::default();
        let block = ShaderProgram::new(ShaderKind::ShadowDepth).bind(&inputs(&light, &material));
        assert_eq!(block.names().collect::<Vec<_>>(), vec!["PVM"]);
    }

    #[test]
    fn raw_layout_is_std140_sized() {
        assert_eq!(std::mem::size_of::<UniformsRaw>(), 432);
        assert_eq!(std::mem::size_of::<UniformsRaw>() % 16, 0);
    }
}
