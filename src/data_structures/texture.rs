//! Textures: backend handles and the wgpu objects behind them.
//!
//! Scene code only ever holds a [`Texture`], a named handle that knows which
//! [`TextureUnit`] it is sampled from. [`GpuTexture`] is the wgpu side used by
//! [`crate::context::Context`].

use std::path::Path;

use crate::{
    error::Result,
    render::{BoundTextures, RenderBackend, TextureId, TextureUnit},
    resources,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// A 2D colour image.
    Image,
    /// Six square faces sampled by direction.
    Cube,
    /// A depth attachment sampled with comparison.
    Depth,
}

impl TextureKind {
    pub fn unit(&self) -> TextureUnit {
        match self {
            TextureKind::Image => TextureUnit::Diffuse,
            TextureKind::Cube => TextureUnit::Cube,
            TextureKind::Depth => TextureUnit::Shadow,
        }
    }
}

/// A texture living on the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub id: TextureId,
    pub kind: TextureKind,
}

impl Texture {
    pub fn new(name: impl Into<String>, id: TextureId, kind: TextureKind) -> Self {
        Self {
            name: name.into(),
            id,
            kind,
        }
    }

    /// Loads an image file and uploads it as a 2D texture.
    pub fn load(backend: &mut dyn RenderBackend, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = resources::load_image(path)?;
        let name = path.display().to_string();
        let id = backend.upload_texture(&name, &image)?;
        Ok(Self::new(name, id, TextureKind::Image))
    }

    pub fn from_image(
        backend: &mut dyn RenderBackend,
        name: &str,
        image: &image::RgbaImage,
    ) -> Result<Self> {
        let id = backend.upload_texture(name, image)?;
        Ok(Self::new(name, id, TextureKind::Image))
    }

    pub fn unit(&self) -> TextureUnit {
        self.kind.unit()
    }

    /// Binds this texture on its unit until the returned guard drops.
    pub fn bind<'a>(&self, backend: &'a mut dyn RenderBackend) -> BoundTextures<'a> {
        BoundTextures::bind(backend, &[(self.unit(), self.id)])
    }
}

/// A wgpu texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl GpuTexture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Depth attachment that can also be sampled with a comparison sampler.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_comparison_sampler(device));

        Self {
            texture,
            view,
            sampler,
        }
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &image::RgbaImage,
        label: &str,
    ) -> Self {
        let (width, height) = image.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_layer(queue, &texture, image, 0);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            sampler: Some(create_default_sampler(device)),
        }
    }

    /// Cube texture from six equally sized square faces in `+X -X +Y -Y +Z -Z` order.
    pub fn from_faces(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: [&image::RgbaImage; 6],
        label: &str,
    ) -> Self {
        let (width, height) = faces[0].dimensions();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in faces.iter().enumerate() {
            write_layer(queue, &texture, face, layer as u32);
        }
        Self::cube_view(device, texture)
    }

    /// Cube texture whose faces are render targets.
    pub fn create_cube_target(
        device: &wgpu::Device,
        size: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.max(1),
                height: size.max(1),
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        Self::cube_view(device, texture)
    }

    /// A renderable view of a single cube face.
    pub fn face_view(&self, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube face view"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    fn cube_view(device: &wgpu::Device, texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        });
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        }));
        Self {
            texture,
            view,
            sampler,
        }
    }
}

fn write_layer(queue: &wgpu::Queue, texture: &wgpu::Texture, image: &image::RgbaImage, layer: u32) {
    let (width, height) = image.dimensions();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
        },
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

pub fn create_comparison_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        compare: Some(wgpu::CompareFunction::LessEqual),
        lod_min_clamp: 0.0,
        lod_max_clamp: 100.0,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{GpuCall, RecordingBackend};

    #[test]
    fn bound_texture_is_unbound_when_the_guard_drops() {
        let mut backend = RecordingBackend::new(4, 4);
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([9, 9, 9, 255]));
        let texture = Texture::from_image(&mut backend, "grey", &image).unwrap();
        {
            let _bound = texture.bind(&mut backend);
        }
        assert_eq!(
            backend.calls(),
            &[
                GpuCall::BindTexture(TextureUnit::Diffuse, texture.id),
                GpuCall::UnbindTexture(TextureUnit::Diffuse),
            ]
        );
    }

    #[test]
    fn kinds_map_to_their_units() {
        assert_eq!(TextureKind::Image.unit(), TextureUnit::Diffuse);
        assert_eq!(TextureKind::Cube.unit(), TextureUnit::Cube);
        assert_eq!(TextureKind::Depth.unit(), TextureUnit::Shadow);
    }
}
