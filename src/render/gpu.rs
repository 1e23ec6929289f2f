use wgpu::util::DeviceExt;

use crate::{
    foundation::{
        core::PixelSize,
        error::{AlphaVideoError, AlphaVideoResult},
    },
    media::frame::VideoFrame,
    render::{
        backend::{BackendKind, CompositorBackend, FrameRGBA},
        pipeline::{DepthCompare, DrawPass, FilterMode, QuadGeometry, TextureParams},
        shader::ProgramSource,
    },
};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// `@group` holding the frame texture and its sampler in the composite WGSL.
const FRAME_BIND_GROUP: u32 = 0;

struct Program {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

struct Geometry {
    positions: wgpu::Buffer,
    uvs: wgpu::Buffer,
    indices: wgpu::Buffer,
}

struct FrameTexture {
    params: TextureParams,
    texture: wgpu::Texture,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Offscreen wgpu context with a colour and a depth attachment.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: PixelSize,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    readback_bytes_per_row: u32,
    program: Option<Program>,
    geometry: Option<Geometry>,
    frame: Option<FrameTexture>,
}

impl GpuBackend {
    pub fn new(size: PixelSize) -> AlphaVideoResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                AlphaVideoError::capability("no gpu adapter available")
            }
            other => AlphaVideoError::capability(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("alphavid_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| AlphaVideoError::capability(format!("wgpu request_device failed: {e:?}")))?;

        let extent = wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        };
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("alphavid_target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("alphavid_depth"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let bytes_per_row_unpadded = size
            .width
            .checked_mul(4)
            .ok_or_else(|| AlphaVideoError::render("render target width overflow"))?;
        let bytes_per_row = align_to(bytes_per_row_unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(bytes_per_row)
            .checked_mul(u64::from(size.height))
            .ok_or_else(|| AlphaVideoError::render("readback buffer size overflow"))?;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("alphavid_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        tracing::debug!(
            adapter = ?adapter.get_info().name,
            width = size.width,
            height = size.height,
            "gpu backend initialized"
        );

        Ok(Self {
            device,
            queue,
            size,
            target,
            target_view,
            depth_view,
            readback,
            readback_bytes_per_row: bytes_per_row,
            program: None,
            geometry: None,
            frame: None,
        })
    }

    /// Run `f` inside a validation scope and turn a captured error into `wrap(message)`.
    fn scoped<T>(
        &self,
        wrap: fn(String) -> AlphaVideoError,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> AlphaVideoResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(wrap(err.to_string())),
            None => Ok(out),
        }
    }

    fn create_texture(&self, width: u32, height: u32) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("alphavid_frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn write_frame(&self, texture: &wgpu::Texture, frame: &VideoFrame, flip_y: bool) {
        let rows = frame.upload_rows(flip_y);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rows,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn bind_frame(
        &self,
        layout: &wgpu::BindGroupLayout,
        texture: &wgpu::Texture,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("alphavid_frame_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

impl CompositorBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn build_program(&mut self, program: &ProgramSource) -> AlphaVideoResult<()> {
        let label = program.label.as_ref();
        let built = self.scoped(AlphaVideoError::shader, |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(program.wgsl.clone()),
            });

            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("alphavid_frame_bgl"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                multisampled: false,
                                view_dimension: wgpu::TextureViewDimension::D2,
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
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

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("alphavid_pl"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let vertex_buffers = [
                wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 0,
                    }],
                },
                wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 1,
                    }],
                },
            ];

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(program.vertex_entry.as_ref()),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &vertex_buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(program.fragment_entry.as_ref()),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: compare_function(DrawPass::QUAD.depth_compare),
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            Program {
                pipeline,
                bind_group_layout,
            }
        })?;

        self.program = Some(built);
        Ok(())
    }

    fn create_geometry(&mut self, geometry: &QuadGeometry) -> AlphaVideoResult<()> {
        let init = |label: &'static str, contents: &[u8], usage: wgpu::BufferUsages| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage,
                })
        };
        let positions = init(
            "alphavid_positions",
            bytemuck::cast_slice(&geometry.positions),
            wgpu::BufferUsages::VERTEX,
        );
        let uvs = init(
            "alphavid_uvs",
            bytemuck::cast_slice(&geometry.uvs),
            wgpu::BufferUsages::VERTEX,
        );
        let indices = init(
            "alphavid_indices",
            bytemuck::cast_slice(&geometry.indices),
            wgpu::BufferUsages::INDEX,
        );
        self.geometry = Some(Geometry {
            positions,
            uvs,
            indices,
        });
        Ok(())
    }

    fn create_frame_texture(
        &mut self,
        params: &TextureParams,
        placeholder: &VideoFrame,
    ) -> AlphaVideoResult<()> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| AlphaVideoError::render("no linked program"))?;

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("alphavid_frame_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(params.mag_filter),
            min_filter: filter_mode(params.min_filter),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let texture = self.create_texture(placeholder.width, placeholder.height);
        self.write_frame(&texture, placeholder, params.flip_y);
        let bind_group = self.bind_frame(&program.bind_group_layout, &texture, &sampler);

        self.frame = Some(FrameTexture {
            params: *params,
            texture,
            sampler,
            bind_group,
            width: placeholder.width,
            height: placeholder.height,
        });
        Ok(())
    }

    fn upload_frame(&mut self, frame: &VideoFrame) -> AlphaVideoResult<()> {
        frame
            .validate()
            .map_err(|e| AlphaVideoError::render(format!("rejected frame upload: {e}")))?;
        let mut current = self
            .frame
            .take()
            .ok_or_else(|| AlphaVideoError::render("frame texture not created"))?;
        let resized = current.width != frame.width || current.height != frame.height;

        let uploaded = self.scoped(AlphaVideoError::render, |_| {
            if resized {
                current.texture = self.create_texture(frame.width, frame.height);
                current.width = frame.width;
                current.height = frame.height;
            }
            self.write_frame(&current.texture, frame, current.params.flip_y);
        });

        if resized && let Some(program) = self.program.as_ref() {
            current.bind_group =
                self.bind_frame(&program.bind_group_layout, &current.texture, &current.sampler);
        }
        self.frame = Some(current);
        uploaded
    }

    fn draw(&mut self, pass: &DrawPass) -> AlphaVideoResult<()> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| AlphaVideoError::render("no linked program"))?;
        let geometry = self
            .geometry
            .as_ref()
            .ok_or_else(|| AlphaVideoError::render("geometry not created"))?;
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| AlphaVideoError::render("frame texture not created"))?;

        let [r, g, b, a] = pass.clear_color;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("alphavid_draw_encoder"),
            });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("alphavid_draw_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(pass.clear_depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&program.pipeline);
            rp.set_bind_group(FRAME_BIND_GROUP, &frame.bind_group, &[]);
            rp.set_vertex_buffer(0, geometry.positions.slice(..));
            rp.set_vertex_buffer(1, geometry.uvs.slice(..));
            rp.set_index_buffer(geometry.indices.slice(..), wgpu::IndexFormat::Uint16);
            rp.draw_indexed(0..pass.index_count, 0, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_pixels(&mut self) -> AlphaVideoResult<FrameRGBA> {
        let width = self.size.width;
        let height = self.size.height;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("alphavid_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.readback_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| AlphaVideoError::render(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| AlphaVideoError::render("readback channel closed"))?
            .map_err(|e| AlphaVideoError::render(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = width as usize * 4;
        let padded_row_bytes = self.readback_bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        self.readback.unmap();

        Ok(FrameRGBA {
            width,
            height,
            data: out,
        })
    }

    fn target_size(&self) -> PixelSize {
        self.size
    }

    fn release(&mut self) {
        self.frame = None;
        self.geometry = None;
        self.program = None;
    }
}

fn compare_function(c: DepthCompare) -> wgpu::CompareFunction {
    match c {
        DepthCompare::Less => wgpu::CompareFunction::Less,
        DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthCompare::Always => wgpu::CompareFunction::Always,
    }
}

fn filter_mode(f: FilterMode) -> wgpu::FilterMode {
    match f {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readback_rows_are_padded_to_copy_alignment() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(1028, 256), 1280);
    }

    #[test]
    fn draw_pass_depth_maps_to_less_equal() {
        assert_eq!(
            compare_function(DrawPass::QUAD.depth_compare),
            wgpu::CompareFunction::LessEqual
        );
    }

    #[test]
    fn frame_bind_group_matches_the_wgsl_declarations() {
        let wgsl = crate::render::shader::DUAL_SAMPLE_ALPHA_WGSL;
        let group = format!("@group({FRAME_BIND_GROUP})");
        assert_eq!(wgsl.matches("@group(").count(), wgsl.matches(group.as_str()).count());
        assert!(wgsl.contains(&format!("{group} @binding(0) var u_frame")));
    }
}
