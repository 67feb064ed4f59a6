//! The wgpu [`RenderBackend`].
//!
//! Draw calls are recorded per pass together with the state current at the
//! time (program, uniforms, bound textures, depth writes) and encoded when the
//! pass ends. Each pass gets its own uniform buffer with one slot per draw,
//! addressed through a dynamic offset, so later `set_uniforms` calls never
//! overwrite the values of earlier draws. Everything encoded in a frame is
//! submitted by [`RenderBackend::present`].

use std::{collections::HashMap, iter, sync::Arc};

use image::{Rgba, RgbaImage};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    data_structures::{
        mesh::Mesh,
        texture::{self, GpuTexture},
    },
    error::{NginError, Result},
    pipelines::{self, PipelineKey},
    render::{MeshId, ProgramId, RenderBackend, Target, TargetId, TextureId, TextureUnit},
    shader::{ShaderKind, ShaderProgram, UniformBlock, UniformsRaw},
};

/// Distance between uniform slots; a multiple of the 256 byte offset alignment.
const UNIFORM_STRIDE: u64 = 512;

struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

enum OffscreenTarget {
    Depth { texture: TextureId },
    Cube { texture: TextureId, depth: GpuTexture },
}

struct DrawCommand {
    kind: ShaderKind,
    depth_write: bool,
    uniforms: UniformsRaw,
    textures: [Option<TextureId>; 3],
    mesh: MeshId,
    index_count: u32,
}

struct PassRecording {
    target: Target,
    commands: Vec<DrawCommand>,
}

struct Frame {
    surface: Option<wgpu::SurfaceTexture>,
    encoder: wgpu::CommandEncoder,
    clear_screen: bool,
}

pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub clear_colour: wgpu::Color,
    depth_texture: GpuTexture,
    is_surface_configured: bool,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    shaders: HashMap<ShaderKind, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    meshes: Vec<Option<GpuMesh>>,
    textures: Vec<Option<GpuTexture>>,
    targets: Vec<OffscreenTarget>,
    programs: Vec<ShaderKind>,
    /// Bound in place of missing textures, one per [`TextureUnit`].
    fallback: [GpuTexture; 3],
    fallback_samplers: [wgpu::Sampler; 3],
    frame: Option<Frame>,
    pass: Option<PassRecording>,
    program: Option<ShaderKind>,
    uniforms: UniformsRaw,
    bound: [Option<TextureId>; 3],
    depth_write: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| NginError::Gpu(format!("cannot create surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| NginError::Gpu(format!("no suitable adapter: {e}")))?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("orbit-ngin device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await
            .map_err(|e| NginError::Gpu(format!("cannot open device: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| NginError::Gpu("surface reports no formats".to_string()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            GpuTexture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let uniform_layout = pipelines::uniform_layout(&device);
        let texture_layout = pipelines::texture_layout(&device);
        let pipeline_layout = pipelines::mk_pipeline_layout(&device, &uniform_layout, &texture_layout);

        let white = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let fallback = [
            GpuTexture::from_image(&device, &queue, &white, "fallback image"),
            GpuTexture::from_faces(&device, &queue, [&white; 6], "fallback cube"),
            GpuTexture::create_depth_texture(&device, [1, 1], "fallback depth"),
        ];
        let fallback_samplers = [
            texture::create_default_sampler(&device),
            texture::create_default_sampler(&device),
            texture::create_comparison_sampler(&device),
        ];

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            clear_colour: wgpu::Color::BLACK,
            depth_texture,
            is_surface_configured: true,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            shaders: HashMap::new(),
            pipelines: HashMap::new(),
            meshes: Vec::new(),
            textures: Vec::new(),
            targets: Vec::new(),
            programs: Vec::new(),
            fallback,
            fallback_samplers,
            frame: None,
            pass: None,
            program: None,
            uniforms: UniformsRaw::default(),
            bound: [None; 3],
            depth_write: true,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.is_surface_configured = true;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = GpuTexture::create_depth_texture(
                &self.device,
                [self.config.width, self.config.height],
                "depth_texture",
            );
        } else {
            // minimised
            self.is_surface_configured = false;
        }
    }

    fn new_frame(&self) -> Frame {
        Frame {
            surface: None,
            encoder: self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Render Encoder") }),
            clear_screen: false,
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let Some(shader) = self.shaders.get(&key.kind) else {
            log::error!("no shader module for {:?}", key.kind);
            return;
        };
        log::debug!("creating pipeline {key:?}");
        let pipeline = pipelines::mk_render_pipeline(&self.device, &self.pipeline_layout, shader, key);
        self.pipelines.insert(key, pipeline);
    }

    fn texture_bind_group(&self, textures: &[Option<TextureId>; 3]) -> wgpu::BindGroup {
        let resolve = |unit: TextureUnit| {
            let index = unit as usize;
            let texture = textures[index]
                .and_then(|id| self.textures.get(id.0 as usize))
                .and_then(Option::as_ref)
                .unwrap_or(&self.fallback[index]);
            let sampler = texture.sampler.as_ref().unwrap_or(&self.fallback_samplers[index]);
            (&texture.view, sampler)
        };
        let (diffuse, diffuse_sampler) = resolve(TextureUnit::Diffuse);
        let (cube, cube_sampler) = resolve(TextureUnit::Cube);
        let (shadow, shadow_sampler) = resolve(TextureUnit::Shadow);
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(diffuse),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(diffuse_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(cube),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(cube_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(shadow),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
            ],
            label: Some("texture_bind_group"),
        })
    }

    fn offscreen(&self, target: TargetId) -> Option<&OffscreenTarget> {
        self.targets.get(target.0 as usize)
    }

    fn texture(&self, texture: TextureId) -> Option<&GpuTexture> {
        self.textures.get(texture.0 as usize).and_then(Option::as_ref)
    }

    /// The texture a pass renders into, which its draws must not sample.
    fn rendered_texture(&self, target: Target) -> Option<TextureId> {
        let id = match target {
            Target::Screen => return None,
            Target::Offscreen(id) | Target::CubeFace { target: id, .. } => id,
        };
        match self.offscreen(id)? {
            OffscreenTarget::Depth { texture } | OffscreenTarget::Cube { texture, .. } => Some(*texture),
        }
    }

    fn acquire_surface(&mut self, frame: &mut Frame) -> bool {
        if frame.surface.is_some() {
            return true;
        }
        if !self.is_surface_configured {
            return false;
        }
        match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                frame.surface = Some(texture);
                true
            }
            e => {
                log::error!("Unable to acquire the surface texture: {e:?}");
                let size = self.window.inner_size();
                self.resize(size.width, size.height);
                false
            }
        }
    }

    fn encode_pass(&mut self, pass: PassRecording) {
        let mut frame = match self.frame.take() {
            Some(frame) => frame,
            None => self.new_frame(),
        };
        self.encode_into(&mut frame, pass);
        self.frame = Some(frame);
    }

    fn encode_into(&mut self, frame: &mut Frame, pass: PassRecording) {
        let color_format = match pass.target {
            Target::Screen => Some(self.config.format),
            Target::Offscreen(_) => None,
            Target::CubeFace { .. } => Some(GpuTexture::COLOR_FORMAT),
        };
        let cube_face = matches!(pass.target, Target::CubeFace { .. });
        let rendered = self.rendered_texture(pass.target);
        let commands: Vec<DrawCommand> = pass
            .commands
            .into_iter()
            .filter(|command| {
                let feedback = rendered.is_some() && command.textures.contains(&rendered);
                if feedback {
                    log::warn!("skipping a draw that samples its own render target {:?}", pass.target);
                }
                !feedback
            })
            .collect();
        let keys: Vec<PipelineKey> = commands
            .iter()
            .map(|command| PipelineKey {
                kind: command.kind,
                depth_write: command.depth_write,
                color_format,
                cube_face,
            })
            .collect();
        for key in &keys {
            self.ensure_pipeline(*key);
        }

        let mut contents = vec![0u8; commands.len().max(1) * UNIFORM_STRIDE as usize];
        for (i, command) in commands.iter().enumerate() {
            let offset = i * UNIFORM_STRIDE as usize;
            let bytes = bytemuck::bytes_of(&command.uniforms);
            contents[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: &contents,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<UniformsRaw>() as u64),
                }),
            }],
            label: Some("uniform_bind_group"),
        });
        let texture_groups: Vec<wgpu::BindGroup> = commands
            .iter()
            .map(|command| self.texture_bind_group(&command.textures))
            .collect();

        let (color_view, color_load, depth_view, depth_load) = match pass.target {
            Target::Screen => {
                if !self.acquire_surface(frame) {
                    return;
                }
                let Some(surface) = frame.surface.as_ref() else {
                    return;
                };
                let view = surface
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let clear = std::mem::take(&mut frame.clear_screen);
                let (color_load, depth_load) = if clear {
                    (wgpu::LoadOp::Clear(self.clear_colour), wgpu::LoadOp::Clear(1.0))
                } else {
                    (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
                };
                (Some(view), color_load, self.depth_texture.view.clone(), depth_load)
            }
            Target::Offscreen(id) => {
                let Some(depth) = rendered.and_then(|texture| self.texture(texture)) else {
                    log::error!("unknown offscreen target {id:?}");
                    return;
                };
                (None, wgpu::LoadOp::Load, depth.view.clone(), wgpu::LoadOp::Clear(1.0))
            }
            Target::CubeFace { target, face } => {
                let (Some(OffscreenTarget::Cube { texture, depth }), Some(cube)) =
                    (self.offscreen(target), rendered.and_then(|texture| self.texture(texture)))
                else {
                    log::error!("unknown cube target {target:?}");
                    return;
                };
                log::trace!("rendering cube face {face} of texture {texture:?}");
                (
                    Some(cube.face_view(face.index() as u32)),
                    wgpu::LoadOp::Clear(self.clear_colour),
                    depth.view.clone(),
                    wgpu::LoadOp::Clear(1.0),
                )
            }
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_view
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        for (i, command) in commands.iter().enumerate() {
            let Some(pipeline) = self.pipelines.get(&keys[i]) else {
                continue;
            };
            let Some(Some(mesh)) = self.meshes.get(command.mesh.0 as usize) else {
                log::warn!("skipping draw of released mesh {:?}", command.mesh);
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &uniform_bind_group, &[(i as u64 * UNIFORM_STRIDE) as u32]);
            render_pass.set_bind_group(1, &texture_groups[i], &[]);
            render_pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            render_pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..command.index_count, 0, 0..1);
        }
    }
}

impl RenderBackend for Context {
    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<MeshId> {
        let vertices = mesh.to_vertices();
        let indices = mesh.indices();
        let vertex = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.push(Some(GpuMesh { vertex, index }));
        Ok(MeshId(self.meshes.len() as u32 - 1))
    }

    fn upload_texture(&mut self, name: &str, image: &RgbaImage) -> Result<TextureId> {
        if image.width() == 0 || image.height() == 0 {
            return Err(NginError::resource(name, "image is empty"));
        }
        let texture = GpuTexture::from_image(&self.device, &self.queue, image, name);
        self.textures.push(Some(texture));
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn upload_cube_map(&mut self, name: &str, faces: [&RgbaImage; 6]) -> Result<TextureId> {
        let size = faces[0].dimensions();
        if size.0 == 0 || size.0 != size.1 {
            return Err(NginError::resource(name, "cube map faces must be square"));
        }
        if faces.iter().any(|face| face.dimensions() != size) {
            return Err(NginError::resource(name, "cube map faces differ in size"));
        }
        let texture = GpuTexture::from_faces(&self.device, &self.queue, faces, name);
        self.textures.push(Some(texture));
        Ok(TextureId(self.textures.len() as u32 - 1))
    }

    fn create_depth_target(&mut self, name: &str, size: u32) -> Result<(TargetId, TextureId)> {
        let texture = GpuTexture::create_depth_texture(&self.device, [size, size], name);
        self.textures.push(Some(texture));
        let texture = TextureId(self.textures.len() as u32 - 1);
        self.targets.push(OffscreenTarget::Depth { texture });
        Ok((TargetId(self.targets.len() as u32 - 1), texture))
    }

    fn create_cube_target(&mut self, name: &str, size: u32) -> Result<(TargetId, TextureId)> {
        let cube = GpuTexture::create_cube_target(&self.device, size, GpuTexture::COLOR_FORMAT, name);
        let depth = GpuTexture::create_depth_texture(&self.device, [size, size], &format!("{name} depth"));
        self.textures.push(Some(cube));
        let texture = TextureId(self.textures.len() as u32 - 1);
        self.targets.push(OffscreenTarget::Cube { texture, depth });
        Ok((TargetId(self.targets.len() as u32 - 1), texture))
    }

    fn link_program(&mut self, program: &ShaderProgram) -> Result<ProgramId> {
        let kind = program.kind();
        if !self.shaders.contains_key(&kind) {
            let module = self.device.create_shader_module(pipelines::shader_descriptor(kind));
            let info = futures::executor::block_on(module.get_compilation_info());
            let errors: Vec<String> = info
                .messages
                .iter()
                .filter(|message| matches!(message.message_type, wgpu::CompilationMessageType::Error))
                .map(|message| message.message.clone())
                .collect();
            if !errors.is_empty() {
                return Err(NginError::shader(program.name(), errors.join("; ")));
            }
            self.shaders.insert(kind, module);
        }
        self.programs.push(kind);
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn release_mesh(&mut self, mesh: MeshId) {
        if let Some(slot) = self.meshes.get_mut(mesh.0 as usize) {
            *slot = None;
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(texture.0 as usize) {
            *slot = None;
        }
    }

    fn window_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn clear(&mut self, target: Target) {
        match target {
            Target::Screen => {
                let frame = match self.frame.take() {
                    Some(frame) => frame,
                    None => self.new_frame(),
                };
                self.frame = Some(Frame {
                    clear_screen: true,
                    ..frame
                });
            }
            other => log::trace!("{other:?} is cleared when its pass begins"),
        }
    }

    fn begin_pass(&mut self, target: Target) {
        if let Some(pass) = self.pass.take() {
            log::warn!("pass into {:?} was not ended", pass.target);
            self.encode_pass(pass);
        }
        self.pass = Some(PassRecording {
            target,
            commands: Vec::new(),
        });
        self.program = None;
        self.uniforms = UniformsRaw::default();
        self.depth_write = true;
    }

    fn end_pass(&mut self) {
        match self.pass.take() {
            Some(pass) => self.encode_pass(pass),
            None => log::warn!("end_pass without a matching begin_pass"),
        }
    }

    fn bind_program(&mut self, program: ProgramId) {
        self.program = self.programs.get(program.0 as usize).copied();
        if self.program.is_none() {
            log::warn!("unknown program {program:?}");
        }
    }

    fn set_uniforms(&mut self, uniforms: &UniformBlock) {
        self.uniforms = uniforms.to_raw();
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId) {
        self.bound[unit as usize] = Some(texture);
    }

    fn unbind_texture(&mut self, unit: TextureUnit) {
        self.bound[unit as usize] = None;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    fn draw_indexed(&mut self, mesh: MeshId, index_count: u32) {
        let Some(kind) = self.program else {
            log::warn!("draw of {mesh:?} without a bound program");
            return;
        };
        let command = DrawCommand {
            kind,
            depth_write: self.depth_write,
            uniforms: self.uniforms,
            textures: self.bound,
            mesh,
            index_count,
        };
        match self.pass.as_mut() {
            Some(pass) => pass.commands.push(command),
            None => log::warn!("draw of {mesh:?} outside of a pass"),
        }
    }

    fn present(&mut self) {
        if let Some(pass) = self.pass.take() {
            log::warn!("pass into {:?} was not ended before present", pass.target);
            self.encode_pass(pass);
        }
        let needs_clear = self.frame.as_ref().is_some_and(|frame| frame.clear_screen);
        if needs_clear {
            self.encode_pass(PassRecording {
                target: Target::Screen,
                commands: Vec::new(),
            });
        }
        let Some(frame) = self.frame.take() else {
            return;
        };
        self.queue.submit(iter::once(frame.encoder.finish()));
        if let Some(surface) = frame.surface {
            self.window.pre_present_notify();
            surface.present();
        }
    }
}
