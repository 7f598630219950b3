//! wgpu backend.
//!
//! Owns the device, the render target (window surface or offscreen texture),
//! the R8 mirror of the trail buffer and one pipeline per distinct material
//! shader. Per-mesh vertex/index buffers and texture bind groups are built
//! when a scene is installed.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{Frame, RenderBackend};
use crate::error::{GpuError, RenderError};
use crate::mesh::{MeshInstance, MeshVertex};
use crate::texture::{srgb_component_to_linear, AddressMode, FilterMode, TextureConfig};
use crate::trail::TrailBuffer;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const TRAIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    model_view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    viewport: [f32; 2],
    _padding: [f32; 2],
}

enum Target {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        readback: wgpu::Buffer,
        padded_bytes_per_row: u32,
        last_frame: Option<RgbaImage>,
    },
}

struct TrailMirror {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

struct MeshDraw {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material_bind_group: wgpu::BindGroup,
    pipeline_key: String,
}

/// Renders with wgpu.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    depth_view: wgpu::TextureView,
    uniform_buffer: wgpu::Buffer,
    trail: TrailMirror,
    trail_sampler: wgpu::Sampler,
    frame_layout: wgpu::BindGroupLayout,
    frame_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    /// Pipelines keyed by their WGSL source.
    pipelines: HashMap<String, wgpu::RenderPipeline>,
    /// Uploaded textures keyed by `Arc` address.
    textures: HashMap<usize, (Arc<TextureConfig>, wgpu::TextureView, wgpu::Sampler)>,
    draws: Vec<MeshDraw>,
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    })
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let info = adapter.get_info();
    log::info!("Using GPU adapter '{}' ({:?})", info.name, info.backend);
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;
    Ok((device, queue))
}

impl GpuBackend {
    /// Render to a window's surface.
    pub fn windowed(window: Arc<Window>) -> Result<Self, GpuError> {
        pollster::block_on(Self::windowed_async(window))
    }

    async fn windowed_async(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let instance = new_instance();
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(GpuError::NoAdapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let (width, height) = (config.width, config.height);
        Ok(Self::build(
            device,
            queue,
            Target::Surface { surface, config },
            format,
            width,
            height,
        ))
    }

    /// Render to an offscreen texture that is read back after every frame.
    pub fn offscreen(width: u32, height: u32) -> Result<Self, GpuError> {
        pollster::block_on(Self::offscreen_async(width, height))
    }

    async fn offscreen_async(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = new_instance();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;

        let width = width.max(1);
        let height = height.max(1);
        let target = create_offscreen_target(&device, width, height);
        Ok(Self::build(device, queue, target, OFFSCREEN_FORMAT, width, height))
    }

    fn build(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: Target,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Buffer"),
            size: std::mem::size_of::<Uniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let trail = create_trail_mirror(&device, 1, 1);
        let trail_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Trail Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let texture_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let both = wgpu::ShaderStages::VERTEX_FRAGMENT;

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: both,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1, both),
                sampler_entry(2, both),
            ],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                texture_entry(0, wgpu::ShaderStages::FRAGMENT),
                sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                texture_entry(2, wgpu::ShaderStages::FRAGMENT),
                sampler_entry(3, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let frame_bind_group =
            create_frame_bind_group(&device, &frame_layout, &uniform_buffer, &trail, &trail_sampler);
        let depth_view = create_depth_texture(&device, width, height);

        Self {
            device,
            queue,
            target,
            format,
            width,
            height,
            depth_view,
            uniform_buffer,
            trail,
            trail_sampler,
            frame_layout,
            frame_bind_group,
            material_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            textures: HashMap::new(),
            draws: Vec::new(),
        }
    }

    fn pipeline_for(&mut self, source: &str) -> String {
        if !self.pipelines.contains_key(source) {
            let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Trail Material Shader"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Trail Material Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            log::debug!("Compiled material pipeline #{}", self.pipelines.len() + 1);
            self.pipelines.insert(source.to_string(), pipeline);
        }
        source.to_string()
    }

    /// Upload a texture once; returns its cache key.
    fn ensure_texture(&mut self, config: &Arc<TextureConfig>) -> usize {
        let key = Arc::as_ptr(config) as usize;
        if self.textures.contains_key(&key) {
            return key;
        }

        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some("Material Texture"),
                size: wgpu::Extent3d {
                    width: config.width,
                    height: config.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &config.data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let filter = match config.filter {
            FilterMode::Linear => wgpu::FilterMode::Linear,
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
        };
        let address = match config.address_mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: address,
            address_mode_v: address,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });

        // Holding the Arc keeps the address from being reused by another texture.
        self.textures.insert(key, (Arc::clone(config), view, sampler));
        key
    }

    fn upload_trail(&mut self, trail: &TrailBuffer) {
        let (width, height) = (trail.width(), trail.height());
        if (width, height) != (self.trail.width, self.trail.height) {
            log::debug!("Trail mirror resized to {}x{}", width, height);
            self.trail = create_trail_mirror(&self.device, width, height);
            self.frame_bind_group = create_frame_bind_group(
                &self.device,
                &self.frame_layout,
                &self.uniform_buffer,
                &self.trail,
                &self.trail_sampler,
            );
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.trail.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &trail.to_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, frame: &Frame<'_>) {
        let [r, g, b] = frame.clear_color.map(|c| srgb_component_to_linear(c) as f64);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
        for draw in &self.draws {
            let Some(pipeline) = self.pipelines.get(&draw.pipeline_key) else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(1, &draw.material_bind_group, &[]);
            render_pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
            render_pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
    }

    fn read_back(&self, readback: &wgpu::Buffer, padded_bytes_per_row: u32) -> Result<RgbaImage, GpuError> {
        let slice = readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let row_bytes = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded_bytes_per_row as usize).take(self.height as usize) {
                pixels.extend_from_slice(&row[..row_bytes]);
            }
        }
        readback.unmap();

        RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| GpuError::BufferMapping("readback size mismatch".into()))
    }
}

impl RenderBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) == (self.width, self.height) {
            return;
        }
        log::debug!("GPU target resized to {}x{}", width, height);
        self.width = width;
        self.height = height;
        if let Target::Surface { surface, config } = &mut self.target {
            config.width = width;
            config.height = height;
            surface.configure(&self.device, config);
        } else {
            self.target = create_offscreen_target(&self.device, width, height);
        }
        self.depth_view = create_depth_texture(&self.device, width, height);
    }

    fn reconfigure(&mut self) {
        if let Target::Surface { surface, config } = &self.target {
            log::debug!("Reconfiguring surface");
            surface.configure(&self.device, config);
        }
    }

    fn install_scene(&mut self, scene: &[MeshInstance]) {
        self.draws.clear();
        for instance in scene {
            let pipeline_key = self.pipeline_for(&instance.material.shader_source());
            let diffuse_key = self.ensure_texture(&instance.material.diffuse);
            let emissive_key = self.ensure_texture(&instance.material.emissive);
            let (_, diffuse_view, diffuse_sampler) = &self.textures[&diffuse_key];
            let (_, emissive_view, emissive_sampler) = &self.textures[&emissive_key];

            let material_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Material Bind Group"),
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(diffuse_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(diffuse_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(emissive_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(emissive_sampler),
                    },
                ],
            });

            let mesh = &instance.mesh;
            let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(&mesh.vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

            self.draws.push(MeshDraw {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                material_bind_group,
                pipeline_key,
            });
        }
        log::debug!(
            "GPU backend installed {} meshes with {} pipelines",
            self.draws.len(),
            self.pipelines.len()
        );
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        let uniforms = Uniforms {
            model_view: frame.matrices.model_view.to_cols_array_2d(),
            projection: frame.matrices.projection.to_cols_array_2d(),
            viewport: frame.viewport.to_array(),
            _padding: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let trail_size_changed = (frame.trail.width(), frame.trail.height()) != (self.trail.width, self.trail.height);
        if frame.trail_dirty || trail_size_changed {
            self.upload_trail(frame.trail);
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        match &self.target {
            Target::Surface { surface, .. } => {
                let output = surface.get_current_texture()?;
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.encode_pass(&mut encoder, &view, frame);
                self.queue.submit(std::iter::once(encoder.finish()));
                output.present();
            }
            Target::Offscreen {
                texture,
                view,
                readback,
                padded_bytes_per_row,
                ..
            } => {
                self.encode_pass(&mut encoder, view, frame);
                encoder.copy_texture_to_buffer(
                    wgpu::TexelCopyTextureInfo {
                        texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::TexelCopyBufferInfo {
                        buffer: readback,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: 0,
                            bytes_per_row: Some(*padded_bytes_per_row),
                            rows_per_image: Some(self.height),
                        },
                    },
                    wgpu::Extent3d {
                        width: self.width,
                        height: self.height,
                        depth_or_array_layers: 1,
                    },
                );
                self.queue.submit(std::iter::once(encoder.finish()));
                let image = self.read_back(readback, *padded_bytes_per_row)?;
                if let Target::Offscreen { last_frame, .. } = &mut self.target {
                    *last_frame = Some(image);
                }
            }
        }
        Ok(())
    }

    fn capture(&self) -> Option<RgbaImage> {
        match &self.target {
            Target::Offscreen { last_frame, .. } => last_frame.clone(),
            Target::Surface { .. } => None,
        }
    }
}

fn create_offscreen_target(device: &wgpu::Device, width: u32, height: u32) -> Target {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Buffer copies need rows aligned to 256 bytes.
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = (width * 4).div_ceil(align) * align;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    Target::Offscreen {
        texture,
        view,
        readback,
        padded_bytes_per_row,
        last_frame: None,
    }
}

fn create_trail_mirror(device: &wgpu::Device, width: u32, height: u32) -> TrailMirror {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Trail Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TRAIL_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    TrailMirror {
        texture,
        width,
        height,
    }
}

fn create_frame_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    trail: &TrailMirror,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let view = trail.texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Frame Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
