//! # ZEROPATH Culling
//!
//! GPU-assisted occlusion culling for very large extrusion paths.
//!
//! Each frame the pipeline asks a [`VisibilityOracle`] which voxels of the
//! scene are on screen, streams that answer back without stalling, reduces
//! it to a sorted list of visible segments on a background worker, and hands
//! the result to the draw pass through a double buffer.
//!
//! ## Architecture
//!
//! ```text
//!  CandidateFilter ──> candidate voxels ──> VisibilityOracle (rasterize ids)
//!                                                  │
//!                                                  ▼
//!  draw pass <── DoubleBuffer <── upload <── dedup worker <── AsyncReadback
//!   (front)        (swap)                   (sort/unique)      (non-blocking)
//! ```
//!
//! The pipeline runs one cycle behind the camera: the draw pass always uses
//! a complete earlier result and never waits for the current one.
//!
//! ## Backends
//!
//! - [`SoftwareOracle`] + [`HostReadback`] + [`HostUpload`]: CPU reference
//!   path, used by tests and the soak binary.
//! - `gpu` feature: wgpu render-pipeline oracle, staging-buffer readback and
//!   storage-buffer visible sets.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod dataset;
pub mod dedup;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod readback;
pub mod upload;
pub mod visible_set;
pub mod voxel;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use config::{CullingConfig, ResolutionPolicy};
pub use dataset::RenderableDataset;
pub use error::{CullingError, CullingResult};
pub use oracle::{IdImage, RasterRequest, Rasterized, Resolution, SoftwareOracle, VisibilityOracle};
pub use pipeline::{CullingPipeline, CullingStats, CycleOutcome};
pub use readback::{AsyncReadback, HostReadback, RawVisibleIds, ReadbackTicket};
pub use upload::{HostUpload, VisibleSetUpload};
pub use visible_set::CanonicalVisibleSet;
pub use voxel::{ProxyMesh, ProxyVertex, VoxelCoord, VoxelIndex, SENTINEL_VOXEL};
