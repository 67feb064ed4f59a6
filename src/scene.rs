//! Scene composition and the per-frame pass order.
//!
//! A [`Scene`] owns the camera, projection, light and models, plus the
//! optional auxiliary passes. [`Scene::draw`] renders one frame:
//!
//! 1. clear the screen target
//! 2. update the camera
//! 3. shadow pass into the shadow map's depth target
//! 4. environment pass into six cube faces, only if a model samples it
//! 5. skybox with a rotation-only view and depth writes off
//! 6. every model in list order
//! 7. present
//!
//! [`Scene::draw_into`] is the framebuffer variant used for auxiliary targets:
//! no clear, no camera update, no present.

use std::ops::Range;

use cgmath::{Matrix4, SquareMatrix};
use instant::Duration;

use crate::{
    camera::{Camera, CameraController, Projection},
    data_structures::{
        light::LightSource,
        scene_graph::SceneNode,
    },
    passes::{EnvironmentMap, ShadowMap, SkyBox},
    render::{FrameContext, RenderBackend, ShadowInput, Target},
    shader::{ShaderKind, ShaderProgram},
};

/// Static scene setup.
#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub clear_colour: [f64; 4],
    /// Vertical field of view in radians.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub shadow_map_size: u32,
    pub environment_map_size: u32,
    pub skybox_scale: f32,
    /// Closest the wheel may bring the camera to its center.
    pub zoom_floor: f32,
    pub zoom_step: f32,
    /// Camera motion for a drag across the whole window.
    pub drag_sensitivity: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "orbit-ngin".to_string(),
            clear_colour: [0.7, 0.7, 1.0, 1.0],
            fovy: std::f32::consts::FRAC_PI_2,
            znear: 1.0,
            zfar: 200.0,
            shadow_map_size: 1024,
            environment_map_size: 400,
            skybox_scale: 100.0,
            zoom_floor: 1.0,
            zoom_step: 1.0,
            drag_sensitivity: 1.0,
        }
    }
}

impl SceneConfig {
    pub fn controller(&self) -> CameraController {
        CameraController::new(self.zoom_step, self.zoom_floor, self.drag_sensitivity)
    }
}

/// Models and light handed to per-frame updates.
pub struct SceneState<'a> {
    pub models: &'a mut Vec<Box<dyn SceneNode>>,
    pub light: &'a mut LightSource,
}

/// Options of [`Scene::draw_into`].
#[derive(Clone, Copy, Default)]
pub struct AuxiliaryPass<'a> {
    pub shadow: Option<&'a ShadowInput>,
    /// Replaces the program of every model.
    pub program_override: Option<&'a ShaderProgram>,
    /// Index of a model left out, e.g. the reflective one.
    pub exclude: Option<usize>,
    /// Draw the skybox before the models.
    pub skybox: bool,
}

pub type SceneUpdate = Box<dyn FnMut(&mut SceneState, Duration)>;

pub struct Scene {
    pub config: SceneConfig,
    pub camera: Camera,
    pub projection: Projection,
    pub light: LightSource,
    models: Vec<Box<dyn SceneNode>>,
    shadow_map: Option<ShadowMap>,
    environment_map: Option<EnvironmentMap>,
    skybox: Option<SkyBox>,
    updates: Vec<SceneUpdate>,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        let projection = Projection::new(config.width, config.height, config.fovy, config.znear, config.zfar);
        Self {
            config,
            camera: Camera::default(),
            projection,
            light: LightSource::default(),
            models: Vec::new(),
            shadow_map: None,
            environment_map: None,
            skybox: None,
            updates: Vec::new(),
        }
    }

    /// Appends a model and returns its index in the draw order.
    pub fn add_model(&mut self, model: Box<dyn SceneNode>) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    pub fn add_models(&mut self, models: impl IntoIterator<Item = Box<dyn SceneNode>>) -> Range<usize> {
        let start = self.models.len();
        self.models.extend(models);
        start..self.models.len()
    }

    pub fn models(&self) -> &[Box<dyn SceneNode>] {
        &self.models
    }

    pub fn model(&self, index: usize) -> Option<&dyn SceneNode> {
        self.models.get(index).map(|model| model.as_ref())
    }

    pub fn model_mut(&mut self, index: usize) -> Option<&mut (dyn SceneNode + 'static)> {
        self.models.get_mut(index).map(|model| model.as_mut())
    }

    pub fn set_shadow_map(&mut self, shadow_map: ShadowMap) {
        self.shadow_map = Some(shadow_map);
    }

    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    pub fn set_environment_map(&mut self, environment_map: EnvironmentMap) {
        self.environment_map = Some(environment_map);
    }

    pub fn environment_map(&self) -> Option<&EnvironmentMap> {
        self.environment_map.as_ref()
    }

    pub fn set_skybox(&mut self, skybox: SkyBox) {
        self.skybox = Some(skybox);
    }

    pub fn skybox(&self) -> Option<&SkyBox> {
        self.skybox.as_ref()
    }

    /// Registers a closure run by [`update`](Self::update) every frame.
    pub fn on_update(&mut self, update: impl FnMut(&mut SceneState, Duration) + 'static) {
        self.updates.push(Box::new(update));
    }

    pub fn update(&mut self, dt: Duration) {
        let mut state = SceneState {
            models: &mut self.models,
            light: &mut self.light,
        };
        for update in &mut self.updates {
            update(&mut state, dt);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.projection.resize(width, height);
        }
    }

    fn samples_environment(&self) -> bool {
        self.models
            .iter()
            .any(|model| model.uses_program(ShaderKind::Environment))
    }

    /// Renders one frame to the screen and presents it.
    pub fn draw(&mut self, backend: &mut dyn RenderBackend) {
        backend.clear(Target::Screen);
        self.camera.update();
        let scene: &Scene = self;
        let view = scene.camera.view_matrix();
        let projection = scene.projection.calc_matrix();

        let shadow = scene
            .shadow_map
            .as_ref()
            .map(|shadow_map| shadow_map.render(&mut *backend, scene));

        let environment = match &scene.environment_map {
            Some(environment_map) if scene.samples_environment() => {
                Some(environment_map.render(&mut *backend, scene, shadow.as_ref()))
            }
            _ => None,
        };

        if let Some(skybox) = &scene.skybox {
            backend.begin_pass(Target::Screen);
            skybox.draw(&mut *backend, view, projection, &scene.light);
            backend.end_pass();
        }

        backend.begin_pass(Target::Screen);
        {
            let mut frame = FrameContext::new(&mut *backend, view, projection, &scene.light);
            frame.shadow = shadow.as_ref();
            frame.environment = environment.as_ref();
            scene.draw_models(&mut frame);
        }
        backend.end_pass();

        backend.present();
    }

    /// Draws the model list into `target` with the given matrices, without
    /// clearing, updating the camera or presenting. Overlays are left out.
    pub fn draw_into(
        &self,
        backend: &mut dyn RenderBackend,
        target: Target,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        pass: AuxiliaryPass,
    ) {
        backend.begin_pass(target);
        if pass.skybox {
            if let Some(skybox) = &self.skybox {
                skybox.draw(&mut *backend, view, projection, &self.light);
            }
        }
        {
            let mut frame = FrameContext::new(&mut *backend, view, projection, &self.light);
            frame.shadow = pass.shadow;
            frame.program_override = pass.program_override;
            frame.overlays = false;
            let identity = Matrix4::identity();
            for (index, model) in self.models.iter().enumerate() {
                if Some(index) == pass.exclude {
                    continue;
                }
                model.draw(&identity, &mut frame);
            }
        }
        backend.end_pass();
    }

    fn draw_models(&self, frame: &mut FrameContext) {
        let identity = Matrix4::identity();
        for model in &self.models {
            model.draw(&identity, frame);
        }
    }

    /// Releases every backend resource the scene holds.
    pub fn teardown(mut self, backend: &mut dyn RenderBackend) {
        for model in &mut self.models {
            model.release(&mut *backend);
        }
        if let Some(skybox) = &mut self.skybox {
            skybox.release(&mut *backend);
        }
        if let Some(shadow_map) = &self.shadow_map {
            shadow_map.release(&mut *backend);
        }
        if let Some(environment_map) = &self.environment_map {
            environment_map.release(&mut *backend);
        }
        log::info!("scene torn down");
    }
}
