//! [`GpuBackend`] implementation on wgpu
//!
//! Pipeline and texture creation runs inside device error scopes so that a
//! bad program surfaces as a [`RenderError::Link`] instead of an uncaptured
//! device error.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::backend::GpuBackend;
use crate::camera::Camera;
use crate::error::{RenderError, Result};
use crate::renderer::Renderer;
use crate::shader::{COMPUTE_ENTRY, FRAGMENT_ENTRY, ProgramKind, ProgramSource, VERTEX_ENTRY};
use crate::uniforms::FrameUniforms;

/// Format of the compute output image
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Target format used for offscreen rendering
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.15,
    a: 1.0,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    corner: [f32; 2],
}

/// Triangle strip covering clip space
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { corner: [-1.0, -1.0] },
    QuadVertex { corner: [1.0, -1.0] },
    QuadVertex { corner: [-1.0, 1.0] },
    QuadVertex { corner: [1.0, 1.0] },
];

const QUAD_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
};

/// Vertex+fragment pipeline
pub struct RenderProgram {
    kind: ProgramKind,
    pipeline: wgpu::RenderPipeline,
}

/// Compute pipeline
pub struct ComputeProgram {
    pipeline: wgpu::ComputePipeline,
}

/// Output image with its bind groups for both passes
pub struct OutputTexture {
    _texture: wgpu::Texture,
    storage_bind_group: wgpu::BindGroup,
    sampled_bind_group: wgpu::BindGroup,
}

/// wgpu device, queue and the layouts shared by every program
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    target_format: wgpu::TextureFormat,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_layout: wgpu::BindGroupLayout,
    storage_layout: wgpu::BindGroupLayout,
    sampled_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl WgpuBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::cast_slice(&[FrameUniforms::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX
                    | wgpu::ShaderStages::FRAGMENT
                    | wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let storage_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Output Storage Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: OUTPUT_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            }],
        });

        let sampled_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Output Sampled Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Output Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            target_format,
            uniform_buffer,
            uniform_bind_group,
            uniform_layout,
            storage_layout,
            sampled_layout,
            sampler,
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Run `f` inside validation and out-of-memory error scopes
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        (value, validation.or(oom))
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn display_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    target: &'e wgpu::TextureView,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

impl GpuBackend for WgpuBackend {
    type RenderProgram = RenderProgram;
    type ComputeProgram = ComputeProgram;
    type OutputTexture = OutputTexture;
    type Quad = wgpu::Buffer;
    type Target = wgpu::TextureView;

    fn create_render_program(&mut self, source: &ProgramSource) -> Result<RenderProgram> {
        let label = source.kind.label();
        let layout = match source.kind {
            ProgramKind::Display => &self.sampled_layout,
            ProgramKind::Raymarch | ProgramKind::Compute => &self.uniform_layout,
        };
        let format = self.target_format;

        let (pipeline, error) = self.scoped(|device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(VERTEX_ENTRY),
                    buffers: &[QUAD_LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            })
        });

        match error {
            Some(e) => Err(RenderError::link(label, e.to_string())),
            None => {
                tracing::debug!(program = label, "render pipeline created");
                Ok(RenderProgram {
                    kind: source.kind,
                    pipeline,
                })
            }
        }
    }

    fn create_compute_program(&mut self, source: &ProgramSource) -> Result<ComputeProgram> {
        let label = source.kind.label();
        let layouts = [&self.uniform_layout, &self.storage_layout];

        let (pipeline, error) = self.scoped(|device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(COMPUTE_ENTRY),
                compilation_options: Default::default(),
                cache: None,
            })
        });

        match error {
            Some(e) => Err(RenderError::link(label, e.to_string())),
            None => {
                tracing::debug!(program = label, "compute pipeline created");
                Ok(ComputeProgram { pipeline })
            }
        }
    }

    fn create_output_texture(&mut self, width: u32, height: u32) -> Result<OutputTexture> {
        let (output, error) = self.scoped(|device| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Raymarch Output"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: OUTPUT_FORMAT,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            let storage_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Output Storage Bind Group"),
                layout: &self.storage_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                }],
            });
            let sampled_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Output Sampled Bind Group"),
                layout: &self.sampled_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

            OutputTexture {
                _texture: texture,
                storage_bind_group,
                sampled_bind_group,
            }
        });

        match error {
            Some(e) => Err(RenderError::Device(format!(
                "failed to allocate {width}x{height} output image: {e}"
            ))),
            None => Ok(output),
        }
    }

    fn create_fullscreen_quad(&mut self) -> Result<wgpu::Buffer> {
        Ok(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Quad"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        }))
    }

    fn write_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }

    fn draw_direct(
        &mut self,
        program: &RenderProgram,
        quad: &wgpu::Buffer,
        target: &wgpu::TextureView,
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Direct Encoder"),
            });

        {
            let mut pass = display_pass(&mut encoder, "Raymarch Pass", target);
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, quad.slice(..));
            pass.draw(0..4, 0..1);
        }

        self.submit(encoder);
    }

    fn dispatch_and_blit(
        &mut self,
        compute: &ComputeProgram,
        display: &RenderProgram,
        texture: &OutputTexture,
        quad: &wgpu::Buffer,
        workgroups: [u32; 2],
        target: &wgpu::TextureView,
    ) {
        debug_assert_eq!(display.kind, ProgramKind::Display);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Compute Blit Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Raymarch Compute Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&compute.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &texture.storage_bind_group, &[]);
            pass.dispatch_workgroups(workgroups[0], workgroups[1], 1);
        }

        // Passes in one encoder execute in order, so the storage writes are
        // complete before the blit samples them
        {
            let mut pass = display_pass(&mut encoder, "Blit Pass", target);
            pass.set_pipeline(&display.pipeline);
            pass.set_bind_group(0, &texture.sampled_bind_group, &[]);
            pass.set_vertex_buffer(0, quad.slice(..));
            pass.draw(0..4, 0..1);
        }

        self.submit(encoder);
    }
}

fn device_descriptor() -> wgpu::DeviceDescriptor<'static> {
    wgpu::DeviceDescriptor {
        label: Some("Forge Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: wgpu::Trace::Off,
    }
}

/// Initialize wgpu for headless rendering (no window)
pub async fn init_headless() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| RenderError::Device(format!("no suitable adapter: {e}")))?;

    let (device, queue) = adapter
        .request_device(&device_descriptor())
        .await
        .map_err(|e| RenderError::Device(format!("failed to create device: {e}")))?;

    Ok((Arc::new(device), Arc::new(queue)))
}

/// Initialize wgpu for a window surface.
///
/// Picks a non-sRGB surface format when one is offered; shading writes its
/// colors straight to the target, matching the software renderer.
pub async fn init_with_surface(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, wgpu::TextureFormat)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| RenderError::Device(format!("no suitable adapter: {e}")))?;

    let (device, queue) = adapter
        .request_device(&device_descriptor())
        .await
        .map_err(|e| RenderError::Device(format!("failed to create device: {e}")))?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| surface_caps.formats.first().copied())
        .ok_or_else(|| RenderError::Device("surface reports no formats".into()))?;

    Ok((Arc::new(device), Arc::new(queue), surface_format))
}

/// Draw one frame offscreen at the renderer's viewport and read it back
pub fn render_to_image(
    renderer: &mut Renderer<WgpuBackend>,
    camera: &Camera,
    time: f32,
) -> Result<image::RgbaImage> {
    let (width, height) = renderer.viewport();
    if width == 0 || height == 0 {
        return Err(RenderError::Device(format!(
            "cannot read back a {width}x{height} image"
        )));
    }

    let (device, queue, format) = {
        let backend = renderer.backend();
        (backend.device.clone(), backend.queue.clone(), backend.target_format)
    };
    if format.block_copy_size(None) != Some(4) {
        return Err(RenderError::Device(format!(
            "readback needs a 4-byte format, target is {format:?}"
        )));
    }

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
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    renderer.draw(time, camera, &view);

    let bytes_per_pixel = 4u32;
    let unpadded_bytes_per_row = width * bytes_per_pixel;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: u64::from(padded_bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = output_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| RenderError::Device(format!("device poll failed: {e}")))?;
    rx.recv()
        .map_err(|e| RenderError::Device(format!("readback channel closed: {e}")))?
        .map_err(|e| RenderError::Device(format!("failed to map readback buffer: {e}")))?;

    let data = buffer_slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
    for row in data.chunks(padded_bytes_per_row as usize) {
        pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
    }
    drop(data);
    output_buffer.unmap();

    if matches!(
        format,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
    ) {
        for pixel in pixels.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
    }

    image::RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| RenderError::Device("readback size mismatch".into()))
}
