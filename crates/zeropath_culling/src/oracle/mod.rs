//! # Visibility Oracle
//!
//! The oracle answers one question per cycle: which voxel proxies cover
//! which pixels from the current camera. Input is the proxy mesh (loaded
//! once per dataset), the candidate voxel ids and a view-projection; output
//! is a 2D buffer of voxel ids where `0` means "no voxel".
//!
//! How the ids get rasterized is the backend's business. Only the contract
//! above is relied upon by the pipeline.

mod software;

use std::fmt;
use std::sync::Arc;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use zeropath_core::Fence;

use crate::error::CullingResult;
use crate::voxel::ProxyMesh;

pub use software::SoftwareOracle;

/// Size of an oracle output in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution, clamping each side to at least one pixel.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width: if width == 0 { 1 } else { width },
            height: if height == 0 { 1 } else { height },
        }
    }

    /// Number of pixels.
    #[inline]
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Host-side id buffer, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdImage {
    /// Size of the image.
    pub resolution: Resolution,
    /// One voxel id per pixel; `0` is empty.
    pub ids: Vec<u32>,
}

impl IdImage {
    /// An image with every pixel empty.
    #[must_use]
    pub fn cleared(resolution: Resolution) -> Self {
        Self {
            resolution,
            ids: vec![0; resolution.pixel_count()],
        }
    }

    /// Id at pixel `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        self.ids
            .get(y as usize * self.resolution.width as usize + x as usize)
            .copied()
    }
}

/// One rasterization request.
#[derive(Debug, Clone, Copy)]
pub struct RasterRequest<'a> {
    /// Voxel ids to draw, ascending. Never contains the sentinel.
    pub candidate_voxels: &'a [u32],
    /// World to clip-space transform (depth range `0..=1`).
    pub view_proj: Mat4,
}

/// Result of [`VisibilityOracle::rasterize`].
#[derive(Debug)]
pub struct Rasterized<T> {
    /// The id buffer, in whatever form the matching readback consumes.
    pub output: T,
    /// Signaled once the device finished rasterizing.
    pub fence: Fence,
}

/// Rasterizes voxel proxies into an id buffer.
pub trait VisibilityOracle {
    /// Backend-specific handle to the id buffer.
    type Output;

    /// Current output size.
    fn resolution(&self) -> Resolution;

    /// Changes the output size. In-flight outputs of the old size become
    /// stale; the pipeline discards their readbacks.
    ///
    /// # Errors
    ///
    /// Returns a device error if the new targets cannot be created.
    fn resize(&mut self, resolution: Resolution) -> CullingResult<()>;

    /// Takes ownership of the proxy geometry of a freshly built index.
    ///
    /// # Errors
    ///
    /// Returns a device error if the geometry cannot be uploaded.
    fn load_proxies(&mut self, mesh: Arc<ProxyMesh>) -> CullingResult<()>;

    /// Drops the proxy geometry of the current dataset.
    fn unload_proxies(&mut self);

    /// Rasterizes the requested voxels. Never blocks on the device.
    ///
    /// # Errors
    ///
    /// Returns a device error if the work cannot be submitted.
    fn rasterize(&mut self, request: &RasterRequest<'_>) -> CullingResult<Rasterized<Self::Output>>;
}
