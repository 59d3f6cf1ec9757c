//! Render-pipeline visibility oracle.

use std::sync::Arc;

use glam::Mat4;
use wgpu::util::DeviceExt;

use super::GpuContext;
use crate::error::{CullingError, CullingResult};
use crate::oracle::{RasterRequest, Rasterized, Resolution, VisibilityOracle};
use crate::voxel::{ProxyMesh, ProxyVertex};

const ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

impl ProxyVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Uint32,    // voxel_id
    ];

    /// Vertex buffer layout of the proxy mesh.
    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Id target produced by [`WgpuOracle`]; consumed by
/// [`WgpuReadback`](super::WgpuReadback).
#[derive(Debug, Clone)]
pub struct GpuIdTarget {
    /// The `R32Uint` texture holding one voxel id per pixel.
    pub texture: Arc<wgpu::Texture>,
    /// Its size.
    pub resolution: Resolution,
}

struct Targets {
    ids: Arc<wgpu::Texture>,
    ids_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

struct Proxies {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    enabled: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    mask: Vec<u32>,
}

/// Rasterizes voxel proxies on the GPU.
pub struct WgpuOracle {
    ctx: GpuContext,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    camera: wgpu::Buffer,
    resolution: Resolution,
    targets: Targets,
    proxies: Option<Proxies>,
}

impl WgpuOracle {
    /// Creates the pipeline and targets at `resolution`.
    #[must_use]
    pub fn new(ctx: GpuContext, resolution: Resolution) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Visibility Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/visibility.wgsl").into()),
        });

        let camera = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Visibility Camera"),
            size: std::mem::size_of::<Mat4>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Visibility Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Visibility Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Visibility Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[ProxyVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: ID_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // Both windings: the camera may sit inside a box.
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
        });

        let targets = create_targets(device, resolution);
        Self {
            ctx,
            pipeline,
            bind_group_layout,
            camera,
            resolution,
            targets,
            proxies: None,
        }
    }
}

fn create_targets(device: &wgpu::Device, resolution: Resolution) -> Targets {
    let size = wgpu::Extent3d {
        width: resolution.width,
        height: resolution.height,
        depth_or_array_layers: 1,
    };
    let ids = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Visibility Ids"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ID_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Visibility Depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Targets {
        ids_view: ids.create_view(&wgpu::TextureViewDescriptor::default()),
        depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        ids: Arc::new(ids),
    }
}

impl VisibilityOracle for WgpuOracle {
    type Output = GpuIdTarget;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn resize(&mut self, resolution: Resolution) -> CullingResult<()> {
        // In-flight copies hold their own Arc to the old texture.
        self.targets = create_targets(&self.ctx.device, resolution);
        self.resolution = resolution;
        Ok(())
    }

    fn load_proxies(&mut self, mesh: Arc<ProxyMesh>) -> CullingResult<()> {
        let index_count = u32::try_from(mesh.indices().len())
            .map_err(|_| CullingError::Device("proxy mesh exceeds u32 indices".into()))?;
        let device = &self.ctx.device;

        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Proxy Vertices"),
            contents: bytemuck::cast_slice(mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Proxy Indices"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        let mask = vec![0u32; mesh.box_count().max(1)];
        let enabled = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Proxy Enabled Mask"),
            contents: bytemuck::cast_slice(&mask),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Visibility Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.camera.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: enabled.as_entire_binding(),
                },
            ],
        });

        self.proxies = Some(Proxies {
            vertices,
            indices,
            index_count,
            enabled,
            bind_group,
            mask,
        });
        Ok(())
    }

    fn unload_proxies(&mut self) {
        self.proxies = None;
    }

    fn rasterize(&mut self, request: &RasterRequest<'_>) -> CullingResult<Rasterized<GpuIdTarget>> {
        let Some(proxies) = self.proxies.as_mut() else {
            return Err(CullingError::Device("no proxy geometry loaded".into()));
        };

        proxies.mask.fill(0);
        for &voxel in request.candidate_voxels {
            if let Some(flag) = proxies.mask.get_mut(voxel as usize) {
                *flag = 1;
            }
        }
        let queue = &self.ctx.queue;
        queue.write_buffer(&proxies.enabled, 0, bytemuck::cast_slice(&proxies.mask));
        queue.write_buffer(&self.camera, 0, bytemuck::bytes_of(&request.view_proj));

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Visibility Pass"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Visibility Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.ids_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &proxies.bind_group, &[]);
            pass.set_vertex_buffer(0, proxies.vertices.slice(..));
            pass.set_index_buffer(proxies.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..proxies.index_count, 0, 0..1);
        }
        queue.submit(std::iter::once(encoder.finish()));

        Ok(Rasterized {
            output: GpuIdTarget {
                texture: Arc::clone(&self.targets.ids),
                resolution: self.resolution,
            },
            fence: self.ctx.submission_fence(),
        })
    }
}
