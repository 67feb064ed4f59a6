use std::time::Duration;

use image::{Rgba, RgbaImage};
use orbit_ngin::{
    SceneConfig,
    animation::{Bounce, Direction},
    cgmath::{Point3, Vector3},
    context::Context,
    data_structures::{
        cube_map::CubeMap,
        mesh::Mesh,
        model::Material,
        scene_graph::{ModelNode, SceneNode},
    },
    debug,
    flow::{self, SceneFlow},
    input::Key,
    math,
    passes::{EnvironmentMap, ShadowMap, SkyBox},
    scene::Scene,
    shader::{ShaderKind, ShaderProgram},
};

/// Vertical gradient from `top` to `bottom`.
fn gradient(top: [u8; 3], bottom: [u8; 3]) -> RgbaImage {
    let size = 64;
    RgbaImage::from_fn(size, size, |_, y| {
        let t = y as f32 / (size - 1) as f32;
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
        Rgba([mix(top[0], bottom[0]), mix(top[1], bottom[1]), mix(top[2], bottom[2]), 255])
    })
}

fn sky() -> CubeMap {
    let side = gradient([120, 160, 255], [200, 220, 255]);
    CubeMap::from_faces(
        "sky",
        [
            side.clone(),
            side.clone(),
            gradient([90, 130, 240], [90, 130, 240]),
            gradient([60, 90, 50], [60, 90, 50]),
            side.clone(),
            side,
        ],
    )
}

#[derive(Default)]
struct Overlays {
    shadow: usize,
    environment: usize,
}

struct Balloon {
    bounce: Bounce,
    balloon: usize,
    overlays: Overlays,
}

impl Balloon {
    fn new() -> Self {
        Self {
            bounce: Bounce::new(120),
            balloon: 0,
            overlays: Overlays::default(),
        }
    }

    fn toggle(scene: &mut Scene, index: usize) {
        if let Some(model) = scene.model_mut(index) {
            let visible = model.is_visible();
            model.set_visible(!visible);
        }
    }
}

impl SceneFlow for Balloon {
    fn on_init(&mut self, ctx: &mut Context, scene: &mut Scene) -> anyhow::Result<()> {
        let config = scene.config.clone();
        let shadow_map = ShadowMap::new(ctx, config.shadow_map_size, config.znear, config.zfar)?;
        let shadow_texture = shadow_map.texture().clone();
        scene.set_shadow_map(shadow_map);
        scene.set_skybox(SkyBox::new(ctx, sky(), config.skybox_scale)?);

        let floor = Mesh::square().with_material(Material::diffuse("grass", Vector3::new(0.3, 0.7, 0.3)));
        scene.add_model(Box::new(ModelNode::new(
            ctx,
            "floor",
            // the unit square faces +Z; lay it flat and center it
            math::translation(Vector3::new(-10.0, -1.0, 10.0))
                * math::uniform_scale(20.0)
                * math::rotation_x(-std::f32::consts::FRAC_PI_2),
            floor,
            ShaderProgram::new(ShaderKind::ShadowMapping),
        )?));

        let balloon = Mesh::cube(false).with_material(Material::new(
            "rubber",
            Vector3::new(0.2, 0.0, 0.0),
            Vector3::new(0.9, 0.1, 0.1),
            Vector3::new(1.0, 1.0, 1.0),
            40.0,
        ));
        self.balloon = scene.add_model(Box::new(ModelNode::new(
            ctx,
            "balloon",
            math::translation(Vector3::new(-3.0, 0.0, 0.0)),
            balloon,
            ShaderProgram::new(ShaderKind::Phong),
        )?));

        let mirror_position = Point3::new(3.0, 0.0, 0.0);
        let mirror = scene.add_model(Box::new(ModelNode::new(
            ctx,
            "mirror",
            math::translation(Vector3::new(mirror_position.x, mirror_position.y, mirror_position.z)),
            Mesh::cube(false),
            ShaderProgram::new(ShaderKind::Environment),
        )?));
        let environment = EnvironmentMap::new(
            ctx,
            config.environment_map_size,
            mirror_position,
            config.znear,
            config.zfar,
        )?
        .with_reflective(mirror);
        let environment_texture = environment.texture().clone();
        scene.set_environment_map(environment);

        self.overlays = Overlays {
            shadow: scene.add_model(Box::new(debug::show_texture(ctx, Some(shadow_texture))?)),
            environment: scene.add_model(Box::new(debug::flattened_cube(ctx, Some(environment_texture))?)),
        };
        Ok(())
    }

    fn on_key(&mut self, scene: &mut Scene, key: Key) {
        match key {
            Key::Char('s') => self.bounce.start(),
            Key::Char('f') => self.bounce.stop(),
            Key::Char('t') => Self::toggle(scene, self.overlays.shadow),
            Key::Char('c') => Self::toggle(scene, self.overlays.environment),
            _ => {}
        }
    }

    fn on_update(&mut self, scene: &mut Scene, _dt: Duration) {
        let step = match self.bounce.step() {
            Some(Direction::Up) => 0.05,
            Some(Direction::Down) => -0.05,
            None => return,
        };
        if let Some(balloon) = scene.model_mut(self.balloon) {
            balloon.translate(Vector3::new(0.0, step, 0.0));
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = SceneConfig {
        title: "balloon".to_string(),
        ..Default::default()
    };
    flow::run(config, Balloon::new())
}
