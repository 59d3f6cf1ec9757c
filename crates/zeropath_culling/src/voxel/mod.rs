//! # Voxel Index
//!
//! Uniform grid over the scene. Every valid segment is recorded in the
//! bucket of each voxel its line passes through; every populated voxel gets
//! one proxy box carrying its bucket id.
//!
//! ```text
//!   id 0  -> sentinel (i32::MIN, i32::MIN, i32::MIN), empty bucket
//!   id 1.. -> populated voxels, in first-touch order
//! ```
//!
//! Id 0 doubles as the oracle's clear value, so an empty pixel can never be
//! mistaken for a real voxel.

mod coord;
mod index;
mod proxy;
mod traversal;

pub use coord::{VoxelCoord, SENTINEL_VOXEL};
pub use index::{IndexStats, VoxelIndex};
pub use proxy::{ProxyMesh, ProxyVertex, BOX_INDEX_COUNT, BOX_VERTEX_COUNT, UNIT_BOX_INDICES, UNIT_BOX_VERTICES};
pub use traversal::{covered_voxels, traverse_grid};
