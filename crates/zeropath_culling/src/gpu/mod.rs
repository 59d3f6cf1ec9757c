//! # wgpu Backend
//!
//! Device implementations of the three pipeline seams:
//!
//! | Seam                | Type                   | Device object                          |
//! |---------------------|------------------------|----------------------------------------|
//! | `VisibilityOracle`  | [`WgpuOracle`]         | render pipeline into an `R32Uint` target |
//! | `AsyncReadback`     | [`WgpuReadback`]       | `MAP_READ` staging buffer + `map_async`  |
//! | `VisibleSetUpload`  | [`WgpuVisibleBuffers`] | two `STORAGE` index buffers             |
//!
//! Completion is observed through polled callbacks only: `map_async` and
//! `Queue::on_submitted_work_done` flip host-visible flags, and
//! [`WgpuReadback::progress`](crate::AsyncReadback::progress) drives them with
//! `Maintain::Poll` once per frame.

mod oracle;
mod readback;
mod upload;

use std::sync::Arc;

use zeropath_core::Fence;

use crate::error::{CullingError, CullingResult};

pub use oracle::{GpuIdTarget, WgpuOracle};
pub use readback::WgpuReadback;
pub use upload::WgpuVisibleBuffers;

/// Device and queue shared by the wgpu backends.
#[derive(Clone)]
pub struct GpuContext {
    /// Logical device.
    pub device: Arc<wgpu::Device>,
    /// Submission queue.
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Wraps an existing device, e.g. the renderer's.
    #[must_use]
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Opens a device without a surface.
    ///
    /// # Errors
    ///
    /// Returns [`CullingError::Device`] if no adapter or device is available.
    pub fn headless() -> CullingResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| CullingError::Device("no GPU adapter found".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ZEROPATH Culling"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| CullingError::Device(e.to_string()))?;

        tracing::info!(adapter = %adapter.get_info().name, "headless culling device opened");
        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    /// A fence signaled once everything submitted so far has executed.
    #[must_use]
    pub fn submission_fence(&self) -> Fence {
        let (fence, signal) = Fence::pending();
        self.queue.on_submitted_work_done(move || signal.signal());
        fence
    }

    /// Fires completed callbacks without waiting.
    pub fn poll(&self) {
        let _ = self.device.poll(wgpu::Maintain::Poll);
    }
}
