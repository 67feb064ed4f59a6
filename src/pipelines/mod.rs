//! Render pipelines for every [`ShaderKind`].
//!
//! All programs share one pipeline layout: group 0 holds the per-draw
//! [`UniformsRaw`] block (dynamic offset), group 1 the three texture units.
//! Pipelines are created lazily per [`PipelineKey`] by [`crate::context::Context`].

use crate::{
    data_structures::{
        model::{ModelVertex, Vertex},
        texture::GpuTexture,
    },
    shader::{ShaderKind, UniformsRaw},
};

/// Everything a pipeline depends on besides the shared layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kind: ShaderKind,
    pub depth_write: bool,
    /// `None` for depth-only targets.
    pub color_format: Option<wgpu::TextureFormat>,
    /// Cube faces are rendered with a y-mirrored projection, which flips winding.
    pub cube_face: bool,
}

pub fn shader_source(kind: ShaderKind) -> &'static str {
    match kind {
        ShaderKind::Flat => concat!(include_str!("common.wgsl"), include_str!("flat.wgsl")),
        ShaderKind::Phong => concat!(include_str!("common.wgsl"), include_str!("phong.wgsl")),
        ShaderKind::ShadowMapping => {
            concat!(include_str!("common.wgsl"), include_str!("shadow_mapping.wgsl"))
        }
        ShaderKind::MaxBrightness => {
            concat!(include_str!("common.wgsl"), include_str!("max_brightness.wgsl"))
        }
        ShaderKind::Environment => {
            concat!(include_str!("common.wgsl"), include_str!("environment.wgsl"))
        }
        ShaderKind::Skybox => concat!(include_str!("common.wgsl"), include_str!("skybox.wgsl")),
        ShaderKind::ShowTexture => {
            concat!(include_str!("common.wgsl"), include_str!("show_texture.wgsl"))
        }
        ShaderKind::FlattenedCube => {
            concat!(include_str!("common.wgsl"), include_str!("flattened_cube.wgsl"))
        }
        ShaderKind::ShadowDepth => {
            concat!(include_str!("common.wgsl"), include_str!("shadow_depth.wgsl"))
        }
    }
}

pub fn shader_descriptor(kind: ShaderKind) -> wgpu::ShaderModuleDescriptor<'static> {
    wgpu::ShaderModuleDescriptor {
        label: Some(kind.name()),
        source: wgpu::ShaderSource::Wgsl(shader_source(kind).into()),
    }
}

/// Depth-only programs have no fragment stage.
pub fn has_fragment(kind: ShaderKind) -> bool {
    kind != ShaderKind::ShadowDepth
}

pub fn cull_mode(kind: ShaderKind) -> Option<wgpu::Face> {
    match kind {
        ShaderKind::Flat
        | ShaderKind::ShowTexture
        | ShaderKind::FlattenedCube
        | ShaderKind::ShadowDepth => None,
        _ => Some(wgpu::Face::Back),
    }
}

pub fn blend(kind: ShaderKind) -> Option<wgpu::BlendState> {
    match kind {
        ShaderKind::Flat | ShaderKind::Phong | ShaderKind::Environment | ShaderKind::ShadowMapping => {
            Some(wgpu::BlendState::ALPHA_BLENDING)
        }
        _ => Some(wgpu::BlendState::REPLACE),
    }
}

fn depth_bias(kind: ShaderKind) -> wgpu::DepthBiasState {
    if kind == ShaderKind::ShadowDepth {
        wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        }
    } else {
        wgpu::DepthBiasState::default()
    }
}

pub fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<UniformsRaw>() as u64),
            },
            count: None,
        }],
        label: Some("uniform_bind_group_layout"),
    })
}

pub fn texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding, view_dimension, sample_type| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension,
            sample_type,
        },
        count: None,
    };
    let sampler = |binding, ty| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(ty),
        count: None,
    };
    let float = wgpu::TextureSampleType::Float { filterable: true };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture(0, wgpu::TextureViewDimension::D2, float),
            sampler(1, wgpu::SamplerBindingType::Filtering),
            texture(2, wgpu::TextureViewDimension::Cube, float),
            sampler(3, wgpu::SamplerBindingType::Filtering),
            texture(4, wgpu::TextureViewDimension::D2, wgpu::TextureSampleType::Depth),
            sampler(5, wgpu::SamplerBindingType::Comparison),
        ],
        label: Some("texture_bind_group_layout"),
    })
}

pub fn mk_pipeline_layout(
    device: &wgpu::Device,
    uniform_layout: &wgpu::BindGroupLayout,
    texture_layout: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Render Pipeline Layout"),
        bind_group_layouts: &[Some(uniform_layout), Some(texture_layout)],
        immediate_size: 0,
    })
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let color_targets: Vec<Option<wgpu::ColorTargetState>> = key
        .color_format
        .map(|format| wgpu::ColorTargetState {
            format,
            blend: blend(key.kind),
            write_mask: wgpu::ColorWrites::ALL,
        })
        .into_iter()
        .map(Some)
        .collect();
    let fragment = (has_fragment(key.kind) && key.color_format.is_some()).then(|| wgpu::FragmentState {
        module: shader,
        entry_point: Some("fs_main"),
        targets: &color_targets,
        compilation_options: Default::default(),
    });
    let vertex_layouts = [ModelVertex::desc()];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(key.kind.name()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: if key.cube_face {
                wgpu::FrontFace::Cw
            } else {
                wgpu::FrontFace::Ccw
            },
            cull_mode: cull_mode(key.kind),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: GpuTexture::DEPTH_FORMAT,
            depth_write_enabled: Some(key.depth_write),
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            stencil: wgpu::StencilState::default(),
            bias: depth_bias(key.kind),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_vertex_entry_point() {
        for kind in ShaderKind::ALL {
            let source = shader_source(kind);
            assert!(source.contains("fn vs_main"), "{kind:?}");
            assert_eq!(source.contains("fn fs_main"), has_fragment(kind), "{kind:?}");
        }
    }

    #[test]
    fn overlays_and_flat_geometry_are_not_culled() {
        assert_eq!(cull_mode(ShaderKind::Flat), None);
        assert_eq!(cull_mode(ShaderKind::ShowTexture), None);
        assert_eq!(cull_mode(ShaderKind::Phong), Some(wgpu::Face::Back));
        assert_eq!(cull_mode(ShaderKind::Skybox), Some(wgpu::Face::Back));
    }

    #[test]
    fn lit_programs_blend_alpha() {
        assert_eq!(blend(ShaderKind::Phong), Some(wgpu::BlendState::ALPHA_BLENDING));
        assert_eq!(blend(ShaderKind::Skybox), Some(wgpu::BlendState::REPLACE));
    }
}
