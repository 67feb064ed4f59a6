//! Scene graph: drawable leaves and composites.
//!
//! Every node has a local transform. A [`ContainerNode`] draws its children
//! in list order with `parent * own`; a [`ModelNode`] binds its program,
//! uniforms and textures and issues a single indexed draw.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use cgmath::{Matrix4, SquareMatrix, Vector3};
use log::warn;

use crate::{
    data_structures::{
        mesh::Mesh,
        model::Material,
        texture::{Texture, TextureKind},
    },
    error::{NginError, Result},
    math,
    render::{BoundTextures, FrameContext, MeshId, RenderBackend, TextureUnit},
    resources,
    shader::{ShaderKind, ShaderProgram, UniformInputs},
};

pub trait SceneNode {
    fn name(&self) -> &str;

    fn local_transform(&self) -> Matrix4<f32>;

    fn set_local_transform(&mut self, transform: Matrix4<f32>);

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    /// Draws the node with `parent` as the accumulated transform of its
    /// ancestors. Invisible nodes issue no backend calls.
    fn draw(&self, parent: &Matrix4<f32>, frame: &mut FrameContext);

    /// Whether this node or a descendant draws with a program of `kind`.
    fn uses_program(&self, kind: ShaderKind) -> bool;

    /// Screen-space nodes are drawn in the main pass only, never into the
    /// shadow map or environment faces.
    fn is_overlay(&self) -> bool {
        false
    }

    fn children(&self) -> &[Box<dyn SceneNode>] {
        &[]
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Box<dyn SceneNode>>> {
        None
    }

    fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        None
    }

    /// Frees the backend resources owned by this node and its children.
    fn release(&mut self, backend: &mut dyn RenderBackend);

    /// Applies `offset` on top of the current transform.
    fn translate(&mut self, offset: Vector3<f32>) {
        let transform = math::translation(offset) * self.local_transform();
        self.set_local_transform(transform);
    }
}

/// A single mesh drawn with one program.
pub struct ModelNode {
    pub name: String,
    pub transform: Matrix4<f32>,
    pub visible: bool,
    mesh: Mesh,
    gpu_mesh: MeshId,
    program: ShaderProgram,
}

impl ModelNode {
    /// Links `program` and uploads `mesh`. Either failing aborts construction.
    pub fn new(
        backend: &mut dyn RenderBackend,
        name: impl Into<String>,
        transform: Matrix4<f32>,
        mesh: Mesh,
        mut program: ShaderProgram,
    ) -> Result<Self> {
        let name = name.into();
        program.link(backend)?;
        let gpu_mesh = backend.upload_mesh(&mesh)?;
        log::debug!("model '{name}' uses mesh '{}' and program '{}'", mesh.name, program.name());
        Ok(Self {
            name,
            transform,
            visible: true,
            mesh,
            gpu_mesh,
            program,
        })
    }

    /// Loads every object of an OBJ file into one composite.
    pub fn load_obj(
        backend: &mut dyn RenderBackend,
        path: impl AsRef<Path>,
        transform: Matrix4<f32>,
        program: ShaderProgram,
    ) -> Result<ContainerNode> {
        let path = path.as_ref();
        let (meshes, _materials) = resources::load_obj(path)?;
        let mut container = ContainerNode::new(path.display().to_string(), transform);
        // meshes sharing a material share its texture
        let mut textures: HashMap<PathBuf, Texture> = HashMap::new();
        for mut mesh in meshes {
            if let Some(file) = mesh.material.texture.clone() {
                let texture_path = path.parent().unwrap_or(Path::new(".")).join(file);
                let texture = match textures.get(&texture_path) {
                    Some(texture) => texture.clone(),
                    None => {
                        let texture = Texture::load(backend, &texture_path)?;
                        textures.insert(texture_path, texture.clone());
                        texture
                    }
                };
                mesh.set_texture(texture);
            }
            let name = mesh.name.clone();
            let node = ModelNode::new(backend, name, Matrix4::identity(), mesh, program.clone())?;
            container.add_child(Box::new(node));
        }
        Ok(container)
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// The texture sampled on `unit` by `kind`, if one is available.
    fn texture_for<'f>(&'f self, unit: TextureUnit, kind: ShaderKind, frame: &'f FrameContext) -> Option<&'f Texture> {
        match unit {
            TextureUnit::Diffuse => self.mesh.texture_of(TextureKind::Image),
            TextureUnit::Cube => {
                let dynamic = if kind == ShaderKind::Environment {
                    frame.environment
                } else {
                    None
                };
                dynamic.or_else(|| self.mesh.texture_of(TextureKind::Cube))
            }
            TextureUnit::Shadow => {
                let dynamic = if kind == ShaderKind::ShadowMapping {
                    frame.shadow.map(|shadow| &shadow.texture)
                } else {
                    None
                };
                dynamic.or_else(|| self.mesh.texture_of(TextureKind::Depth))
            }
        }
    }
}

impl SceneNode for ModelNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_transform(&self) -> Matrix4<f32> {
        self.transform
    }

    fn set_local_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn draw(&self, parent: &Matrix4<f32>, frame: &mut FrameContext) {
        if !self.visible || (!frame.overlays && self.is_overlay()) {
            return;
        }
        let program = frame.program_override.unwrap_or(&self.program);
        let Some(program_id) = program.id() else {
            warn!("skipping '{}': program '{}' is not linked", self.name, program.name());
            return;
        };
        let kind = program.kind();

        let mut bindings = Vec::new();
        for &unit in kind.required_units() {
            match self.texture_for(unit, kind, frame) {
                Some(texture) => bindings.push((unit, texture.id)),
                None => {
                    warn!(
                        "skipping '{}': program '{}' needs a texture on {unit:?}",
                        self.name,
                        program.name()
                    );
                    return;
                }
            }
        }
        for &unit in kind.optional_units() {
            if let Some(texture) = self.texture_for(unit, kind, frame) {
                bindings.push((unit, texture.id));
            }
        }

        let inputs = UniformInputs {
            projection: frame.projection,
            view: frame.view,
            model: parent * self.transform,
            light: frame.light,
            material: &self.mesh.material,
            has_texture: bindings.iter().any(|(unit, _)| *unit == TextureUnit::Diffuse),
            shadow: frame.shadow.map(|shadow| shadow.matrix),
        };
        let uniforms = program.bind(&inputs);

        frame.backend.bind_program(program_id);
        frame.backend.set_uniforms(&uniforms);
        let mut bound = BoundTextures::bind(frame.backend, &bindings);
        bound.draw_indexed(self.gpu_mesh, self.mesh.index_count());
    }

    fn uses_program(&self, kind: ShaderKind) -> bool {
        self.program.kind() == kind
    }

    fn is_overlay(&self) -> bool {
        self.program.kind().is_screen_space()
    }

    fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        Some(&mut self.mesh)
    }

    fn release(&mut self, backend: &mut dyn RenderBackend) {
        backend.release_mesh(self.gpu_mesh);
    }
}

/// An ordered group of nodes sharing a parent transform.
pub struct ContainerNode {
    pub name: String,
    pub transform: Matrix4<f32>,
    pub visible: bool,
    children: Vec<Box<dyn SceneNode>>,
}

impl ContainerNode {
    pub fn new(name: impl Into<String>, transform: Matrix4<f32>) -> Self {
        Self {
            name: name.into(),
            transform,
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: Box<dyn SceneNode>) -> Self {
        self.add_child(child);
        self
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_transform(&self) -> Matrix4<f32> {
        self.transform
    }

    fn set_local_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn draw(&self, parent: &Matrix4<f32>, frame: &mut FrameContext) {
        if !self.visible {
            return;
        }
        let transform = parent * self.transform;
        for child in &self.children {
            child.draw(&transform, frame);
        }
    }

    fn uses_program(&self, kind: ShaderKind) -> bool {
        self.children.iter().any(|child| child.uses_program(kind))
    }

    fn children(&self) -> &[Box<dyn SceneNode>] {
        &self.children
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Box<dyn SceneNode>>> {
        Some(&mut self.children)
    }

    fn release(&mut self, backend: &mut dyn RenderBackend) {
        for child in &mut self.children {
            child.release(backend);
        }
    }
}

/// A flat-shaded tree: a brown trunk and three pairs of mirrored green
/// triangles, one unit tall.
pub fn tree(backend: &mut dyn RenderBackend, transform: Matrix4<f32>) -> Result<ContainerNode> {
    let mut program = ShaderProgram::new(ShaderKind::Flat);
    program.link(backend)?;
    let trunk = Material::diffuse("trunk", Vector3::new(0.6, 0.2, 0.2));
    let leaves = Material::diffuse("leaves", Vector3::new(0.0, 1.0, 0.0));

    let mut tree = ContainerNode::new("tree", transform);
    tree.add_child(Box::new(ModelNode::new(
        backend,
        "trunk",
        math::pose(Vector3::new(-0.125, 0.0, 0.0), 0.0, Vector3::new(0.25, 0.5, 1.0)),
        Mesh::square().with_material(trunk),
        program.clone(),
    )?));
    for height in [0.5, 0.75, 1.0] {
        for side in [1.0, -1.0] {
            let pose = math::pose(
                Vector3::new(0.0, height, 0.0),
                0.0,
                Vector3::new(0.25 * side, 0.5, 1.0),
            );
            let leaf = ModelNode::new(
                backend,
                "leaf",
                pose,
                Mesh::triangle().with_material(leaves.clone()),
                program.clone(),
            )?;
            tree.add_child(Box::new(leaf));
        }
    }
    Ok(tree)
}

/// Walks `node` and its descendants depth first.
pub fn visit(node: &dyn SceneNode, f: &mut dyn FnMut(&dyn SceneNode)) {
    f(node);
    for child in node.children() {
        visit(child.as_ref(), f);
    }
}

/// Looks up a direct or nested child by name.
pub fn find<'a>(node: &'a dyn SceneNode, name: &str) -> Option<&'a dyn SceneNode> {
    if node.name() == name {
        return Some(node);
    }
    node.children()
        .iter()
        .find_map(|child| find(child.as_ref(), name))
}

/// Replaces the texture of `kind` on every mesh below `node`.
pub fn set_texture(node: &mut dyn SceneNode, texture: &Texture) -> Result<()> {
    let mut found = false;
    if let Some(mesh) = node.mesh_mut() {
        mesh.set_texture(texture.clone());
        found = true;
    }
    if let Some(children) = node.children_mut() {
        for child in children.iter_mut() {
            found |= set_texture(child.as_mut(), texture).is_ok();
        }
    }
    if found {
        Ok(())
    } else {
        Err(NginError::resource(node.name(), "node has no mesh to texture"))
    }
}
