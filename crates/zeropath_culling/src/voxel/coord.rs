//! Integer grid coordinates.

use glam::{DVec3, Vec3};

/// Integer 3D grid coordinate: scene position divided by the voxel size,
/// rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelCoord {
    /// X cell.
    pub x: i32,
    /// Y cell.
    pub y: i32,
    /// Z cell.
    pub z: i32,
}

/// Coordinate of the always-present empty voxel (id 0).
pub const SENTINEL_VOXEL: VoxelCoord = VoxelCoord::splat(i32::MIN);

impl VoxelCoord {
    /// Creates a coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Same value on every axis.
    #[inline]
    #[must_use]
    pub const fn splat(v: i32) -> Self {
        Self::new(v, v, v)
    }

    /// Cell containing a grid-space point. Saturates at the `i32` range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn containing(grid: DVec3) -> Self {
        let f = grid.floor();
        Self::new(f.x as i32, f.y as i32, f.z as i32)
    }

    /// Cell containing a scene position.
    #[inline]
    #[must_use]
    pub fn from_position(position: Vec3, voxel_size: f32) -> Self {
        Self::containing(position.as_dvec3() / f64::from(voxel_size))
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    #[inline]
    #[must_use]
    pub const fn axis(&self, axis: usize) -> i32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Mutable component by axis index.
    #[inline]
    pub fn axis_mut(&mut self, axis: usize) -> &mut i32 {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => &mut self.z,
        }
    }
}
