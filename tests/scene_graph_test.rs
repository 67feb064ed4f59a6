mod common;

use approx::{assert_relative_eq, relative_ne};
use cgmath::{Matrix4, SquareMatrix, Vector3};
use orbit_ngin::{
    data_structures::{
        mesh::Mesh,
        scene_graph::{self, ContainerNode, ModelNode, SceneNode},
    },
    error::NginError,
    math,
    render::{GpuCall, RecordingBackend},
    scene::{Scene, SceneConfig},
    shader::{ShaderKind, ShaderProgram},
};

fn backend() -> RecordingBackend {
    RecordingBackend::new(800, 600)
}

#[test]
fn composite_child_is_drawn_with_parent_times_child() {
    let mut backend = backend();
    let parent = math::translation(Vector3::new(3.0, 0.0, 0.0));
    let child = math::rotation_z(0.5) * math::uniform_scale(2.0);
    let node = ModelNode::new(
        &mut backend,
        "child",
        child,
        Mesh::triangle(),
        ShaderProgram::new(ShaderKind::Flat),
    )
    .unwrap();
    let container = ContainerNode::new("parent", parent).with_child(Box::new(node));

    let mut scene = Scene::new(SceneConfig::default());
    scene.add_model(Box::new(container));
    scene.draw(&mut backend);

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    let pvm = draws[0].uniforms.as_ref().unwrap().mat4("PVM").unwrap();
    let pv = scene.projection.calc_matrix() * scene.camera.view_matrix();
    assert_relative_eq!(pvm, pv * parent * child, epsilon = 1e-5);
    assert!(relative_ne!(pvm, pv * child * parent, epsilon = 1e-3));
}

#[test]
fn invisible_model_issues_no_draw() {
    let mut backend = backend();
    let mut scene = Scene::new(SceneConfig::default());
    let hidden = ModelNode::new(
        &mut backend,
        "hidden",
        Matrix4::identity(),
        Mesh::triangle(),
        ShaderProgram::new(ShaderKind::Flat),
    )
    .unwrap()
    .hidden();
    scene.add_model(Box::new(hidden));
    scene.add_model(common::model(&mut backend, "shown", Mesh::square(), ShaderKind::Flat));

    scene.draw(&mut backend);

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].mesh_name, "square");
}

#[test]
fn hidden_container_hides_its_children() {
    let mut backend = backend();
    let mut tree = scene_graph::tree(&mut backend, Matrix4::identity()).unwrap();
    tree.set_visible(false);
    let mut scene = Scene::new(SceneConfig::default());
    scene.add_model(Box::new(tree));

    scene.draw(&mut backend);

    assert!(backend.draws().is_empty());
    assert_eq!(backend.calls().last(), Some(&GpuCall::Present));
}

#[test]
fn model_missing_its_texture_is_skipped_and_the_frame_presents() {
    let mut backend = backend();
    let mut scene = Scene::new(SceneConfig::default());
    scene.add_model(common::model(&mut backend, "no cube map", Mesh::cube(false), ShaderKind::Skybox));
    scene.add_model(common::model(&mut backend, "plain", Mesh::square(), ShaderKind::Phong));

    scene.draw(&mut backend);

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].kind, Some(ShaderKind::Phong));
    assert_eq!(backend.calls().last(), Some(&GpuCall::Present));
}

#[test]
fn rejected_program_aborts_model_construction() {
    let mut backend = backend();
    backend.reject_program("phong");
    let result = ModelNode::new(
        &mut backend,
        "shiny",
        Matrix4::identity(),
        Mesh::cube(false),
        ShaderProgram::new(ShaderKind::Phong),
    );
    assert!(matches!(result, Err(NginError::ShaderLink { .. })));
}

#[test]
fn tree_is_a_trunk_and_six_leaves() {
    let mut backend = backend();
    let tree = scene_graph::tree(&mut backend, Matrix4::identity()).unwrap();

    let mut names = Vec::new();
    scene_graph::visit(&tree, &mut |node| names.push(node.name().to_string()));
    assert_eq!(names.len(), 8);
    assert_eq!(names.iter().filter(|name| *name == "leaf").count(), 6);
    assert!(scene_graph::find(&tree, "trunk").is_some());

    let mut scene = Scene::new(SceneConfig::default());
    scene.add_model(Box::new(tree));
    scene.draw(&mut backend);
    assert_eq!(backend.draws().len(), 7);
    // one program shared by every part
    let program = backend.draws()[0].program;
    assert!(backend.draws().iter().all(|draw| draw.program == program));
}

#[test]
fn per_frame_updates_move_models() {
    let mut backend = backend();
    let mut scene = Scene::new(SceneConfig::default());
    let index = scene.add_model(common::model(&mut backend, "mover", Mesh::square(), ShaderKind::Flat));
    scene.on_update(move |state, _dt| {
        state.models[index].translate(Vector3::new(0.0, 1.0, 0.0));
    });

    scene.update(instant::Duration::from_millis(16));
    scene.update(instant::Duration::from_millis(16));

    let transform = scene.model(index).unwrap().local_transform();
    assert_relative_eq!(transform, math::translation(Vector3::new(0.0, 2.0, 0.0)));
}

#[test]
fn obj_meshes_sharing_a_material_share_one_texture() {
    let dir = std::env::temp_dir().join(format!("orbit-ngin-shared-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    common::solid([200, 100, 50, 255]).save(dir.join("skin.png")).unwrap();
    std::fs::write(dir.join("pair.mtl"), "newmtl skin\nKd 1 1 1\nmap_Kd skin.png\n").unwrap();
    std::fs::write(
        dir.join("pair.obj"),
        "mtllib pair.mtl\n\
         o left\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl skin\nf 1 2 3\n\
         o right\nv 2 0 0\nv 3 0 0\nv 2 1 0\nusemtl skin\nf 4 5 6\n",
    )
    .unwrap();

    let mut backend = backend();
    let pair = ModelNode::load_obj(
        &mut backend,
        dir.join("pair.obj"),
        Matrix4::identity(),
        ShaderProgram::new(ShaderKind::Phong),
    )
    .unwrap();
    assert_eq!(pair.children().len(), 2);
    assert_eq!(backend.live_textures(), 1);

    let mut scene = Scene::new(SceneConfig::default());
    scene.add_model(Box::new(pair));
    scene.draw(&mut backend);
    let draws = backend.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].textures, draws[1].textures);
    assert_eq!(draws[0].textures.len(), 1);
}
