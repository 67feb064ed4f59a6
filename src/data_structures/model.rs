//! Vertex layout and materials shared by every mesh.

use std::collections::HashMap;

use cgmath::Vector3;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Interleaved vertex as uploaded to the GPU.
///
/// Texture coordinates always carry three components so planar (`u, v`) and
/// volumetric (cube map direction) coordinates share one layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Phong material parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub ka: Vector3<f32>,
    pub kd: Vector3<f32>,
    pub ks: Vector3<f32>,
    pub ns: f32,
    pub alpha: f32,
    /// Image file of the diffuse texture, if the material names one.
    pub texture: Option<String>,
}

impl Material {
    pub fn new(name: impl Into<String>, ka: Vector3<f32>, kd: Vector3<f32>, ks: Vector3<f32>, ns: f32) -> Self {
        Self {
            name: name.into(),
            ka,
            kd,
            ks,
            ns,
            alpha: 1.0,
            texture: None,
        }
    }

    /// A material that only carries a diffuse colour.
    pub fn diffuse(name: impl Into<String>, colour: Vector3<f32>) -> Self {
        Self::new(name, colour * 0.2, colour, Vector3::new(0.0, 0.0, 0.0), 1.0)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(
            "default",
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            10.0,
        )
    }
}

/// Materials by name, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
    names: HashMap<String, usize>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `material`, replacing one with the same name. Returns its index.
    pub fn add(&mut self, material: Material) -> usize {
        match self.names.get(&material.name) {
            Some(&index) => {
                self.materials[index] = material;
                index
            }
            None => {
                self.names.insert(material.name.clone(), self.materials.len());
                self.materials.push(material);
                self.materials.len() - 1
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.names.get(name).map(|&index| &self.materials[index])
    }

    pub fn by_index(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_replaces_by_name() {
        let mut library = MaterialLibrary::new();
        let a = library.add(Material::diffuse("wood", Vector3::new(0.5, 0.3, 0.1)));
        library.add(Material::diffuse("leaf", Vector3::new(0.1, 0.6, 0.1)));
        let again = library.add(Material::diffuse("wood", Vector3::new(0.4, 0.2, 0.1)));
        assert_eq!(a, again);
        assert_eq!(library.len(), 2);
        assert_eq!(library.get("wood").unwrap().kd, Vector3::new(0.4, 0.2, 0.1));
    }

    #[test]
    fn vertex_stride_is_nine_floats() {
        assert_eq!(ModelVertex::desc().array_stride, 36);
    }
}
