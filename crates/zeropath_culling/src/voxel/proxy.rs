//! # Proxy Geometry
//!
//! One unit box per voxel (8 vertices, 12 triangles), concatenated into a
//! single static mesh. Every vertex carries the id of its voxel so the
//! oracle can write it straight into the id buffer.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use super::index::VoxelIndex;

/// Vertices per box.
pub const BOX_VERTEX_COUNT: usize = 8;

/// Indices per box.
pub const BOX_INDEX_COUNT: usize = 36;

/// Corners of the unit box: front face (`z = 1`) then back face (`z = 0`).
pub const UNIT_BOX_VERTICES: [[i32; 3]; BOX_VERTEX_COUNT] = [
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
];

/// Two triangles per face: front, right, back, left, bottom, top.
pub const UNIT_BOX_INDICES: [u32; BOX_INDEX_COUNT] = [
    0, 1, 2, 2, 3, 0, //
    1, 5, 6, 6, 2, 1, //
    7, 6, 5, 5, 4, 7, //
    4, 0, 3, 3, 7, 4, //
    4, 5, 1, 1, 0, 4, //
    3, 2, 6, 6, 7, 3,
];

/// Proxy vertex as uploaded to the device.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ProxyVertex {
    /// Scene position.
    pub position: [f32; 3],
    /// Voxel id written by the oracle.
    pub voxel_id: u32,
}

/// Static box mesh covering every voxel of an index, sentinel included.
#[derive(Debug, Clone, Default)]
pub struct ProxyMesh {
    vertices: Vec<ProxyVertex>,
    indices: Vec<u32>,
}

impl ProxyMesh {
    /// Emits one box per voxel, in id order.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(index: &VoxelIndex) -> Self {
        let count = index.voxel_count();
        let size = f64::from(index.voxel_size());
        let mut vertices = Vec::with_capacity(count * BOX_VERTEX_COUNT);
        let mut indices = Vec::with_capacity(count * BOX_INDEX_COUNT);

        for id in 0..count as u32 {
            let Some(coord) = index.coord(id) else {
                continue;
            };
            let base = vertices.len() as u32;
            for offset in UNIT_BOX_VERTICES {
                let corner = |axis: usize| ((f64::from(coord.axis(axis)) + f64::from(offset[axis])) * size) as f32;
                vertices.push(ProxyVertex {
                    position: [corner(0), corner(1), corner(2)],
                    voxel_id: id,
                });
            }
            indices.extend(UNIT_BOX_INDICES.iter().map(|i| base + i));
        }

        Self { vertices, indices }
    }

    /// All vertices.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[ProxyVertex] {
        &self.vertices
    }

    /// All indices.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of boxes.
    #[inline]
    #[must_use]
    pub fn box_count(&self) -> usize {
        self.vertices.len() / BOX_VERTEX_COUNT
    }

    /// Index range of the box of voxel `id`.
    #[inline]
    #[must_use]
    pub fn index_range(&self, id: u32) -> Range<usize> {
        let start = id as usize * BOX_INDEX_COUNT;
        start..start + BOX_INDEX_COUNT
    }

    /// Triangles of the box of voxel `id`, or `None` past the end.
    pub fn box_triangles(&self, id: u32) -> Option<impl Iterator<Item = [ProxyVertex; 3]> + '_> {
        let indices = self.indices.get(self.index_range(id))?;
        Some(indices.chunks_exact(3).map(|tri| {
            [
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            ]
        }))
    }
}
