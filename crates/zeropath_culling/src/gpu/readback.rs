//! Staging-buffer readback of id targets.
//!
//! Texture rows are copied with `bytes_per_row` padded to
//! `COPY_BYTES_PER_ROW_ALIGNMENT`; the padding is stripped on map so the
//! host sees exactly `width * height` ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::oracle::GpuIdTarget;
use super::GpuContext;
use crate::error::{CullingError, CullingResult};
use crate::readback::{AsyncReadback, RawVisibleIds, ReadbackTicket};

const PENDING: u8 = 0;
const MAPPED: u8 = 1;
const FAILED: u8 = 2;

const ID_BYTES: u32 = 4;

struct Transfer {
    buffer: wgpu::Buffer,
    state: Arc<AtomicU8>,
    padded_row: u32,
    width: u32,
    height: u32,
}

/// Non-blocking readback through `MAP_READ` staging buffers.
pub struct WgpuReadback {
    ctx: GpuContext,
    next_id: u64,
    in_flight: HashMap<u64, Transfer>,
}

impl WgpuReadback {
    /// Creates a readback on `ctx`.
    #[must_use]
    pub fn new(ctx: GpuContext) -> Self {
        Self {
            ctx,
            next_id: 0,
            in_flight: HashMap::new(),
        }
    }
}

fn padded_row_bytes(width: u32) -> u32 {
    let unpadded = width * ID_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

impl AsyncReadback for WgpuReadback {
    type Source = GpuIdTarget;

    fn progress(&mut self) {
        self.ctx.poll();
    }

    fn begin(&mut self, source: GpuIdTarget) -> CullingResult<ReadbackTicket> {
        let resolution = source.resolution;
        let padded_row = padded_row_bytes(resolution.width);
        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Visibility Readback"),
            size: u64::from(padded_row) * u64::from(resolution.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Visibility Readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(resolution.height),
                },
            },
            wgpu::Extent3d {
                width: resolution.width,
                height: resolution.height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let state = Arc::new(AtomicU8::new(PENDING));
        let callback_state = Arc::clone(&state);
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let next = if result.is_ok() { MAPPED } else { FAILED };
            callback_state.store(next, Ordering::Release);
        });

        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.insert(
            id,
            Transfer {
                buffer,
                state,
                padded_row,
                width: resolution.width,
                height: resolution.height,
            },
        );
        Ok(ReadbackTicket::new(id, resolution))
    }

    fn poll_ready(&mut self, ticket: &ReadbackTicket) -> bool {
        self.in_flight
            .get(&ticket.id())
            .is_some_and(|t| t.state.load(Ordering::Acquire) != PENDING)
    }

    fn map(&mut self, ticket: &ReadbackTicket) -> CullingResult<RawVisibleIds> {
        let state = self
            .in_flight
            .get(&ticket.id())
            .map(|t| t.state.load(Ordering::Acquire))
            .ok_or(CullingError::UnknownTicket(ticket.id()))?;
        if state == PENDING {
            return Err(CullingError::WouldBlock);
        }
        let transfer = self
            .in_flight
            .remove(&ticket.id())
            .ok_or(CullingError::UnknownTicket(ticket.id()))?;
        if state == FAILED {
            return Err(CullingError::ReadbackFailed("buffer mapping failed".into()));
        }

        let row_bytes = (transfer.width * ID_BYTES) as usize;
        let mut ids = Vec::with_capacity(transfer.width as usize * transfer.height as usize);
        {
            let view = transfer.buffer.slice(..).get_mapped_range();
            for row in view.chunks_exact(transfer.padded_row as usize) {
                ids.extend_from_slice(bytemuck::cast_slice::<u8, u32>(&row[..row_bytes]));
            }
        }
        transfer.buffer.unmap();
        Ok(RawVisibleIds(ids))
    }

    fn discard(&mut self, ticket: ReadbackTicket) {
        if let Some(transfer) = self.in_flight.remove(&ticket.id()) {
            if transfer.state.load(Ordering::Acquire) == MAPPED {
                transfer.buffer.unmap();
            }
        }
    }
}
