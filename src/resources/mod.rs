/**
 * Thin loaders turning files on disk into engine data: images into RGBA
 * buffers and Wavefront OBJ files into meshes with their materials.
 */
use std::path::Path;

use cgmath::Vector3;

use crate::{
    data_structures::{
        mesh::{Mesh, TexCoords},
        model::{Material, MaterialLibrary},
    },
    error::{NginError, Result},
};

/// Decodes an image file into 8-bit RGBA.
pub fn load_image(path: impl AsRef<Path>) -> Result<image::RgbaImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| NginError::resource(path.display().to_string(), e))?;
    log::info!("loaded image {} ({}x{})", path.display(), image.width(), image.height());
    Ok(image.to_rgba8())
}

/// Loads every object of an OBJ file as a triangulated, single-index mesh.
///
/// Materials from the accompanying MTL file are collected into a
/// [`MaterialLibrary`] and copied onto the meshes that use them; a missing
/// MTL file only costs the materials.
pub fn load_obj(path: impl AsRef<Path>) -> Result<(Vec<Mesh>, MaterialLibrary)> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| NginError::resource(&name, e))?;

    let mut library = MaterialLibrary::new();
    // tobj material id -> library index
    let material_ids: Vec<usize> = match materials {
        Ok(materials) => materials.iter().map(|m| library.add(to_material(m))).collect(),
        Err(e) => {
            log::warn!("no materials for {name}: {e}");
            Vec::new()
        }
    };

    let mut meshes = Vec::with_capacity(models.len());
    for model in models {
        let m = &model.mesh;
        let vertices: Vec<[f32; 3]> = m
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        let faces = m
            .indices
            .chunks_exact(3)
            .map(|f| [f[0], f[1], f[2]])
            .collect();
        let mut mesh = Mesh::new(model.name.clone(), vertices, faces)?;
        if m.normals.len() == m.positions.len() {
            let normals = m.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect();
            mesh = mesh.with_normals(normals)?;
        }
        if m.texcoords.len() / 2 == m.positions.len() / 3 && !m.texcoords.is_empty() {
            // OBJ puts v = 0 at the bottom, wgpu at the top.
            let coords = m.texcoords.chunks_exact(2).map(|t| [t[0], 1.0 - t[1]]).collect();
            mesh = mesh.with_tex_coords(TexCoords::Planar(coords))?;
        }
        if let Some(material) = m
            .material_id
            .and_then(|id| material_ids.get(id))
            .and_then(|&index| library.by_index(index))
        {
            mesh = mesh.with_material(material.clone());
        }
        meshes.push(mesh);
    }
    log::info!("loaded {} meshes and {} materials from {name}", meshes.len(), library.len());
    Ok((meshes, library))
}

fn to_material(m: &tobj::Material) -> Material {
    let defaults = Material::default();
    let colour = |c: Option<[f32; 3]>, fallback: Vector3<f32>| c.map(Vector3::from).unwrap_or(fallback);
    Material {
        name: m.name.clone(),
        ka: colour(m.ambient, defaults.ka),
        kd: colour(m.diffuse, defaults.kd),
        ks: colour(m.specular, defaults.ks),
        ns: m.shininess.unwrap_or(defaults.ns),
        alpha: m.dissolve.unwrap_or(1.0),
        texture: m.diffuse_texture.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_is_a_resource_error() {
        let result = load_image("does/not/exist.png");
        assert!(matches!(result, Err(NginError::ResourceLoad { .. })));
    }

    #[test]
    fn obj_with_material_is_loaded() {
        let dir = std::env::temp_dir().join(format!("orbit-ngin-obj-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("quad.mtl"),
            "newmtl red\nKa 0.1 0 0\nKd 1 0 0\nKs 0.5 0.5 0.5\nNs 20\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("quad.obj"),
            "mtllib quad.mtl\no quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nusemtl red\nf 1 2 3 4\n",
        )
        .unwrap();

        let (meshes, materials) = load_obj(dir.join("quad.obj")).unwrap();
        assert_eq!(meshes.len(), 1);
        assert_eq!(materials.len(), 1);
        assert_eq!(materials.get("red").unwrap().ks, Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(meshes[0].index_count(), 6);
        assert_eq!(meshes[0].material.name, "red");
        assert_eq!(meshes[0].material.kd, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(meshes[0].material.ns, 20.0);
    }
}
