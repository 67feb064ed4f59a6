//! CPU-side triangle meshes and the built-in primitives.

use cgmath::{InnerSpace, Vector3};

use crate::{
    data_structures::{
        model::{Material, ModelVertex},
        texture::{Texture, TextureKind},
    },
    error::{NginError, Result},
};

/// Per-vertex texture coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TexCoords {
    #[default]
    None,
    /// `(u, v)` into a 2D image.
    Planar(Vec<[f32; 2]>),
    /// A direction into a cube map.
    Volumetric(Vec<[f32; 3]>),
}

impl TexCoords {
    fn len(&self) -> Option<usize> {
        match self {
            TexCoords::None => None,
            TexCoords::Planar(coords) => Some(coords.len()),
            TexCoords::Volumetric(coords) => Some(coords.len()),
        }
    }

    fn at(&self, index: usize) -> [f32; 3] {
        match self {
            TexCoords::None => [0.0; 3],
            TexCoords::Planar(coords) => [coords[index][0], coords[index][1], 0.0],
            TexCoords::Volumetric(coords) => coords[index],
        }
    }
}

/// Indexed triangles with optional normals, texture coordinates and textures.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    vertices: Vec<[f32; 3]>,
    faces: Vec<[u32; 3]>,
    normals: Vec<[f32; 3]>,
    tex_coords: TexCoords,
    pub material: Material,
    pub textures: Vec<Texture>,
}

impl Mesh {
    /// Builds a mesh and derives smooth normals from the faces.
    ///
    /// Fails if a face references a vertex that does not exist.
    pub fn new(name: impl Into<String>, vertices: Vec<[f32; 3]>, faces: Vec<[u32; 3]>) -> Result<Self> {
        let name = name.into();
        if let Some(face) = faces
            .iter()
            .find(|face| face.iter().any(|&i| i as usize >= vertices.len()))
        {
            return Err(NginError::resource(
                &name,
                format!("face {face:?} indexes past {} vertices", vertices.len()),
            ));
        }
        let normals = compute_normals(&vertices, &faces);
        Ok(Self {
            name,
            vertices,
            faces,
            normals,
            tex_coords: TexCoords::None,
            material: Material::default(),
            textures: Vec::new(),
        })
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Result<Self> {
        if normals.len() != self.vertices.len() {
            return Err(NginError::resource(
                &self.name,
                format!("{} normals for {} vertices", normals.len(), self.vertices.len()),
            ));
        }
        self.normals = normals;
        Ok(self)
    }

    pub fn with_tex_coords(mut self, tex_coords: TexCoords) -> Result<Self> {
        if let Some(len) = tex_coords.len() {
            if len != self.vertices.len() {
                return Err(NginError::resource(
                    &self.name,
                    format!("{len} texture coordinates for {} vertices", self.vertices.len()),
                ));
            }
        }
        self.tex_coords = tex_coords;
        Ok(self)
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.textures.push(texture);
        self
    }

    /// Replaces every texture of the same kind as `texture`.
    pub fn set_texture(&mut self, texture: Texture) {
        self.textures.retain(|existing| existing.kind != texture.kind);
        self.textures.push(texture);
    }

    pub fn texture_of(&self, kind: TextureKind) -> Option<&Texture> {
        self.textures.iter().find(|texture| texture.kind == kind)
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn tex_coords(&self) -> &TexCoords {
        &self.tex_coords
    }

    pub fn index_count(&self) -> u32 {
        self.faces.len() as u32 * 3
    }

    pub fn to_vertices(&self) -> Vec<ModelVertex> {
        (0..self.vertices.len())
            .map(|i| ModelVertex {
                position: self.vertices[i],
                normal: self.normals[i],
                tex_coords: self.tex_coords.at(i),
            })
            .collect()
    }

    pub fn indices(&self) -> Vec<u32> {
        self.faces.iter().flatten().copied().collect()
    }

    /// Unit triangle in the XY plane with corners at the origin, `+X` and `+Y`.
    pub fn triangle() -> Self {
        let vertices = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        Self::flat_primitive("triangle", vertices, vec![[0, 1, 2]])
    }

    /// Unit square in the XY plane spanning `[0, 1]` on both axes.
    pub fn square() -> Self {
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        Self::flat_primitive("square", vertices, vec![[0, 1, 2], [0, 2, 3]])
    }

    fn flat_primitive(name: &str, vertices: Vec<[f32; 3]>, faces: Vec<[u32; 3]>) -> Self {
        let planar = vertices.iter().map(|v| [v[0], v[1]]).collect();
        Self {
            name: name.to_string(),
            normals: vec![[0.0, 0.0, 1.0]; vertices.len()],
            tex_coords: TexCoords::Planar(planar),
            vertices,
            faces,
            material: Material::default(),
            textures: Vec::new(),
        }
    }

    /// Cube spanning `[-1, 1]` with four vertices per face.
    ///
    /// Texture coordinates are the vertex directions so the cube can sample a
    /// cube map. With `inside` the faces and normals point inwards, which is
    /// what a skybox needs.
    pub fn cube(inside: bool) -> Self {
        // (normal, u, v) with u x v = normal, so corners wind counter-clockwise
        // seen from outside.
        const SIDES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut faces = Vec::with_capacity(12);
        for (side, (n, u, v)) in SIDES.iter().enumerate() {
            let (n, u, v) = (Vector3::from(*n), Vector3::from(*u), Vector3::from(*v));
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                vertices.push((n + u * su + v * sv).into());
                normals.push(if inside { (-n).into() } else { n.into() });
            }
            let base = side as u32 * 4;
            if inside {
                faces.push([base, base + 2, base + 1]);
                faces.push([base, base + 3, base + 2]);
            } else {
                faces.push([base, base + 1, base + 2]);
                faces.push([base, base + 2, base + 3]);
            }
        }
        Self {
            name: if inside { "inside cube" } else { "cube" }.to_string(),
            tex_coords: TexCoords::Volumetric(vertices.clone()),
            vertices,
            faces,
            normals,
            material: Material::default(),
            textures: Vec::new(),
        }
    }

    /// Screen-space quad of half size 0.5 centred on the origin.
    pub fn overlay_quad() -> Self {
        let vertices = vec![
            [-0.5, -0.5, 0.0],
            [-0.5, 0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
        ];
        let planar = vec![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        Self {
            name: "overlay quad".to_string(),
            normals: vec![[0.0, 0.0, 1.0]; 4],
            tex_coords: TexCoords::Planar(planar),
            vertices,
            faces: vec![[0, 3, 1], [0, 2, 3]],
            material: Material::default(),
            textures: Vec::new(),
        }
    }

    /// The six faces of a cube unfolded into a cross, each face textured by
    /// the cube map direction it shows.
    pub fn flattened_cube() -> Self {
        // Lower-left corner of each face in the cross, and the directions at
        // its corners (lower-left, upper-left, lower-right, upper-right).
        const LAYOUT: [([f32; 2], [[f32; 3]; 4]); 6] = [
            ([-2.0, -1.0], [[-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0]]),
            ([-1.0, -1.0], [[-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]]),
            ([0.0, -1.0], [[1.0, 1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, -1.0], [1.0, -1.0, -1.0]]),
            ([1.0, -1.0], [[1.0, 1.0, -1.0], [1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0]]),
            ([-1.0, 0.0], [[-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, -1.0, -1.0]]),
            ([-1.0, -2.0], [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]]),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut directions = Vec::with_capacity(24);
        let mut faces = Vec::with_capacity(12);
        for (i, ([x, y], corners)) in LAYOUT.iter().enumerate() {
            for (j, (dx, dy)) in [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)].into_iter().enumerate() {
                vertices.push([(x + dx) / 2.0, (y + dy) / 2.0, 0.0]);
                directions.push(corners[j]);
            }
            let base = i as u32 * 4;
            faces.push([base, base + 3, base + 1]);
            faces.push([base, base + 2, base + 3]);
        }
        Self {
            name: "flattened cube".to_string(),
            normals: vec![[0.0, 0.0, 1.0]; vertices.len()],
            tex_coords: TexCoords::Volumetric(directions),
            vertices,
            faces,
            material: Material::default(),
            textures: Vec::new(),
        }
    }
}

/// Area-weighted vertex normals. Vertices on no face get `+Z`.
fn compute_normals(vertices: &[[f32; 3]], faces: &[[u32; 3]]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for face in faces {
        let [a, b, c] = face.map(|i| Vector3::from(vertices[i as usize]));
        let normal = (b - a).cross(c - a);
        for &i in face {
            sums[i as usize] += normal;
        }
    }
    sums.into_iter()
        .map(|sum| {
            if sum.magnitude2() > 0.0 {
                sum.normalize().into()
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_face_is_rejected() {
        let result = Mesh::new("bad", vec![[0.0; 3]; 3], vec![[0, 1, 3]]);
        assert!(matches!(result, Err(NginError::ResourceLoad { .. })));
    }

    #[test]
    fn derived_normals_follow_winding() {
        let mesh = Mesh::new(
            "tri",
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2]],
        )
        .unwrap();
        assert_eq!(mesh.normals()[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn inside_cube_normals_point_to_center() {
        let cube = Mesh::cube(true);
        assert_eq!(cube.index_count(), 36);
        for (position, normal) in cube.vertices().iter().zip(cube.normals()) {
            let p = Vector3::from(*position);
            assert!(p.dot(Vector3::from(*normal)) < 0.0);
        }
    }

    #[test]
    fn cube_winding_matches_normals() {
        for inside in [false, true] {
            let cube = Mesh::cube(inside);
            for face in cube.faces() {
                let [a, b, c] = face.map(|i| Vector3::from(cube.vertices()[i as usize]));
                let geometric = (b - a).cross(c - a);
                let stored = Vector3::from(cube.normals()[face[0] as usize]);
                assert!(geometric.dot(stored) > 0.0);
            }
        }
    }

    #[test]
    fn tex_coord_count_must_match() {
        let mesh = Mesh::new("tri", vec![[0.0; 3]; 3], vec![[0, 1, 2]]).unwrap();
        let result = mesh.with_tex_coords(TexCoords::Planar(vec![[0.0, 0.0]]));
        assert!(result.is_err());
    }
}
