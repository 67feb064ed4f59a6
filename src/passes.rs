//! The auxiliary render passes run before the main pass.
//!
//! # Key types
//!
//! - [`ShadowMap`]: depth from the light's viewpoint, sampled by shadow-mapping programs
//! - [`EnvironmentMap`]: the scene rendered into a cube around a reflective object
//! - [`SkyBox`]: an inward cube drawn with the camera's rotation only

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix};

use crate::{
    data_structures::{
        cube_map::{CubeFace, CubeMap},
        light::LightSource,
        mesh::Mesh,
        scene_graph::{ModelNode, SceneNode},
        texture::{Texture, TextureKind},
    },
    error::Result,
    math,
    render::{FrameContext, RenderBackend, ShadowInput, Target, TargetId},
    scene::{AuxiliaryPass, Scene},
    shader::{ShaderKind, ShaderProgram},
};

pub struct ShadowMap {
    size: u32,
    target: TargetId,
    texture: Texture,
    program: ShaderProgram,
    projection: Matrix4<f32>,
}

impl ShadowMap {
    /// Creates a square depth target of `size` texels.
    ///
    /// The light projection is a frustum with a 90° field of view covering
    /// `near..far`.
    pub fn new(backend: &mut dyn RenderBackend, size: u32, near: f32, far: f32) -> Result<Self> {
        let (target, id) = backend.create_depth_target("shadow map", size)?;
        let mut program = ShaderProgram::new(ShaderKind::ShadowDepth);
        program.link(backend)?;
        let projection = math::OPENGL_TO_WGPU_MATRIX * math::frustum(-near, near, -near, near, near, far);
        Ok(Self {
            size,
            target,
            texture: Texture::new("shadow map", id, TextureKind::Depth),
            program,
            projection,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn target(&self) -> Target {
        Target::Offscreen(self.target)
    }

    /// `P_light * V_light`.
    pub fn light_matrix(&self, light: &LightSource) -> Matrix4<f32> {
        self.projection * light.view_matrix()
    }

    /// Renders every visible model's depth and returns the input of the main pass.
    pub fn render(&self, backend: &mut dyn RenderBackend, scene: &Scene) -> ShadowInput {
        scene.draw_into(
            backend,
            self.target(),
            scene.light.view_matrix(),
            self.projection,
            AuxiliaryPass {
                program_override: Some(&self.program),
                ..Default::default()
            },
        );
        ShadowInput {
            matrix: self.light_matrix(&scene.light),
            texture: self.texture.clone(),
        }
    }

    pub fn release(&self, backend: &mut dyn RenderBackend) {
        backend.release_texture(self.texture.id);
    }
}

pub struct EnvironmentMap {
    target: TargetId,
    texture: Texture,
    /// Capture point used while no model is marked reflective.
    pub position: Point3<f32>,
    /// Index into the scene's model list of the object that reflects the map.
    pub reflective: Option<usize>,
    projection: Matrix4<f32>,
}

impl EnvironmentMap {
    pub fn new(
        backend: &mut dyn RenderBackend,
        size: u32,
        position: Point3<f32>,
        near: f32,
        far: f32,
    ) -> Result<Self> {
        let (target, id) = backend.create_cube_target("environment map", size)?;
        // Cube faces store texels top-down, so y is mirrored relative to a
        // regular render target.
        let flip_y = math::scale(cgmath::Vector3::new(1.0, -1.0, 1.0));
        let projection =
            flip_y * math::OPENGL_TO_WGPU_MATRIX * math::frustum(-near, near, -near, near, near, far);
        Ok(Self {
            target,
            texture: Texture::new("environment map", id, TextureKind::Cube),
            position,
            reflective: None,
            projection,
        })
    }

    pub fn with_reflective(mut self, index: usize) -> Self {
        self.reflective = Some(index);
        self
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn face_target(&self, face: CubeFace) -> Target {
        Target::CubeFace {
            target: self.target,
            face,
        }
    }

    /// Where the faces are captured from: the reflective model's origin,
    /// or `position` when no model is marked reflective.
    pub fn capture_point(&self, models: &[Box<dyn SceneNode>]) -> Point3<f32> {
        self.reflective
            .and_then(|index| models.get(index))
            .map(|model| Point3::from_vec(model.local_transform().w.truncate()))
            .unwrap_or(self.position)
    }

    /// Renders the six faces: skybox first, then every model but the
    /// reflective one.
    pub fn render(
        &self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
        shadow: Option<&ShadowInput>,
    ) -> Texture {
        let position = self.capture_point(scene.models());
        for face in CubeFace::ALL {
            scene.draw_into(
                &mut *backend,
                self.face_target(face),
                face.view_from(position),
                self.projection,
                AuxiliaryPass {
                    shadow,
                    exclude: self.reflective,
                    skybox: true,
                    ..Default::default()
                },
            );
        }
        self.texture.clone()
    }

    pub fn release(&self, backend: &mut dyn RenderBackend) {
        backend.release_texture(self.texture.id);
    }
}

pub struct SkyBox {
    model: ModelNode,
    cube_map: CubeMap,
}

impl SkyBox {
    /// Uploads `cube_map` and wraps it in an inward cube scaled by `scale`.
    ///
    /// An incomplete cube map is an error here rather than at draw time.
    pub fn new(backend: &mut dyn RenderBackend, mut cube_map: CubeMap, scale: f32) -> Result<Self> {
        let texture = cube_map.upload(backend)?;
        let mesh = Mesh::cube(true).with_texture(texture);
        let model = ModelNode::new(
            backend,
            "skybox",
            math::uniform_scale(scale),
            mesh,
            ShaderProgram::new(ShaderKind::Skybox),
        )?;
        Ok(Self { model, cube_map })
    }

    pub fn cube_map(&self) -> &CubeMap {
        &self.cube_map
    }

    /// The view the skybox is drawn with: rotation only.
    pub fn view_for(view: &Matrix4<f32>) -> Matrix4<f32> {
        math::strip_translation(view)
    }

    pub fn draw(
        &self,
        backend: &mut dyn RenderBackend,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        light: &LightSource,
    ) {
        backend.set_depth_write(false);
        {
            let mut frame = FrameContext::new(&mut *backend, Self::view_for(&view), projection, light);
            self.model.draw(&Matrix4::identity(), &mut frame);
        }
        backend.set_depth_write(true);
    }

    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        self.model.release(backend);
        self.cube_map.release(backend);
    }
}
