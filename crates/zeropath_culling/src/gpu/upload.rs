//! Front/back visible-set index buffers.

use super::GpuContext;
use crate::error::CullingResult;
use crate::upload::VisibleSetUpload;
use zeropath_core::Fence;

const MIN_CAPACITY: u64 = 1024;

struct SlotBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    count: u32,
}

/// Two `STORAGE` buffers of segment indices, one per double-buffer slot.
///
/// The draw pass binds the buffer of the published slot and draws `count`
/// instances from it.
pub struct WgpuVisibleBuffers {
    ctx: GpuContext,
    slots: [Option<SlotBuffer>; 2],
}

impl WgpuVisibleBuffers {
    /// Creates an empty pair; buffers are allocated on first upload.
    #[must_use]
    pub fn new(ctx: GpuContext) -> Self {
        Self { ctx, slots: [None, None] }
    }

    /// Buffer of `slot`, if anything was uploaded into it.
    #[must_use]
    pub fn buffer(&self, slot: usize) -> Option<&wgpu::Buffer> {
        self.slots[slot & 1].as_ref().map(|s| &s.buffer)
    }

    /// Number of segment indices in `slot`.
    #[must_use]
    pub fn count(&self, slot: usize) -> u32 {
        self.slots[slot & 1].as_ref().map_or(0, |s| s.count)
    }
}

impl VisibleSetUpload for WgpuVisibleBuffers {
    #[allow(clippy::cast_possible_truncation)]
    fn upload(&mut self, slot: usize, segments: &[u32]) -> CullingResult<Fence> {
        let bytes = std::mem::size_of_val(segments) as u64;
        let entry = &mut self.slots[slot & 1];

        if entry.as_ref().map_or(true, |s| s.capacity < bytes) {
            let capacity = bytes.next_power_of_two().max(MIN_CAPACITY);
            let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Visible Segments"),
                size: capacity,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            tracing::debug!(slot, capacity, "visible-set buffer (re)allocated");
            *entry = Some(SlotBuffer {
                buffer,
                capacity,
                count: 0,
            });
        }

        if let Some(target) = entry.as_mut() {
            if !segments.is_empty() {
                self.ctx.queue.write_buffer(&target.buffer, 0, bytemuck::cast_slice(segments));
            }
            target.count = segments.len() as u32;
        }
        // Flush the staged write so the fence covers it.
        self.ctx.queue.submit(std::iter::empty());
        Ok(self.ctx.submission_fence())
    }
}
