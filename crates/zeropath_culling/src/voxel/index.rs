//! Voxel buckets over segment indices.

use std::collections::HashMap;

use glam::Vec3;
use zeropath_core::SetBits;
use zeropath_path::{PathPoint, SegmentTable};

use super::coord::{VoxelCoord, SENTINEL_VOXEL};
use super::traversal::traverse_grid;

/// Build statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    /// Valid segments that were traversed.
    pub segments_indexed: usize,
    /// Populated voxels, sentinel excluded.
    pub voxels: usize,
    /// Sum of bucket sizes.
    pub bucket_entries: usize,
    /// Largest bucket.
    pub max_bucket: usize,
}

/// Uniform grid of segment buckets.
///
/// Buckets are sorted and duplicate-free. Immutable after [`VoxelIndex::build`]
/// as far as the pipeline is concerned; a reload builds a new index.
#[derive(Debug, Clone)]
pub struct VoxelIndex {
    voxel_size: f32,
    coords: Vec<VoxelCoord>,
    buckets: Vec<Vec<u32>>,
    lookup: HashMap<VoxelCoord, u32>,
    segment_slots: usize,
}

impl VoxelIndex {
    /// An index holding only the sentinel voxel.
    #[must_use]
    pub fn empty(voxel_size: f32, segment_slots: usize) -> Self {
        let mut lookup = HashMap::new();
        lookup.insert(SENTINEL_VOXEL, 0);
        Self {
            voxel_size,
            coords: vec![SENTINEL_VOXEL],
            buckets: vec![Vec::new()],
            lookup,
            segment_slots,
        }
    }

    /// Buckets every valid segment of `points` into the voxels it crosses.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(points: &[PathPoint], table: &SegmentTable, voxel_size: f32) -> Self {
        let mut index = Self::empty(voxel_size, table.len());
        let size = f64::from(voxel_size);
        let mut cells = Vec::new();

        for segment in table.valid_indices() {
            let Some((a, b)) = table.endpoints(points, segment) else {
                continue;
            };
            cells.clear();
            traverse_grid(a.as_dvec3() / size, b.as_dvec3() / size, &mut cells);
            for &cell in &cells {
                index.insert(cell, segment as u32);
            }
        }

        let stats = index.stats();
        tracing::info!(
            segments = table.valid_count(),
            voxels = stats.voxels,
            entries = stats.bucket_entries,
            max_bucket = stats.max_bucket,
            voxel_size,
            "voxel index built"
        );
        index
    }

    /// Records `segment` in the bucket of `coord`, creating the voxel if
    /// needed. Returns `false` if it was already there.
    ///
    /// The sentinel cell is reserved and silently refused.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, coord: VoxelCoord, segment: u32) -> bool {
        if coord == SENTINEL_VOXEL {
            tracing::debug!(segment, "segment reaches the sentinel cell; skipped");
            return false;
        }
        let id = *self.lookup.entry(coord).or_insert_with(|| {
            self.coords.push(coord);
            self.buckets.push(Vec::new());
            (self.coords.len() - 1) as u32
        });
        let bucket = &mut self.buckets[id as usize];
        match bucket.binary_search(&segment) {
            Ok(_) => false,
            Err(at) => {
                bucket.insert(at, segment);
                true
            }
        }
    }

    /// Edge length of a voxel.
    #[inline]
    #[must_use]
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Number of voxels, sentinel included. Valid ids are `0..voxel_count()`.
    #[inline]
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.coords.len()
    }

    /// Number of segment slots the index was built over.
    #[inline]
    #[must_use]
    pub fn segment_slots(&self) -> usize {
        self.segment_slots
    }

    /// Segments recorded in voxel `id`, ascending.
    #[inline]
    #[must_use]
    pub fn bucket(&self, id: u32) -> Option<&[u32]> {
        self.buckets.get(id as usize).map(Vec::as_slice)
    }

    /// Grid coordinate of voxel `id`.
    #[inline]
    #[must_use]
    pub fn coord(&self, id: u32) -> Option<VoxelCoord> {
        self.coords.get(id as usize).copied()
    }

    /// Id of the voxel at `coord`, if populated.
    #[inline]
    #[must_use]
    pub fn id_of(&self, coord: VoxelCoord) -> Option<u32> {
        self.lookup.get(&coord).copied()
    }

    /// Id of the voxel containing a scene position, if populated.
    #[must_use]
    pub fn id_at(&self, position: Vec3) -> Option<u32> {
        self.id_of(VoxelCoord::from_position(position, self.voxel_size))
    }

    /// Voxels holding at least one candidate segment, ascending.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn candidate_voxels(&self, candidates: &impl SetBits) -> Vec<u32> {
        self.buckets
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, bucket)| bucket.iter().any(|&s| candidates.test(s as usize)))
            .map(|(id, _)| id as u32)
            .collect()
    }

    /// Build statistics.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let populated = &self.buckets[1..];
        let segments: std::collections::HashSet<u32> = populated.iter().flatten().copied().collect();
        IndexStats {
            segments_indexed: segments.len(),
            voxels: populated.len(),
            bucket_entries: populated.iter().map(Vec::len).sum(),
            max_bucket: populated.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeropath_core::BitSet;
    use zeropath_path::{ExtrusionRole, ValidityRule};

    fn ex(x: f32, y: f32, z: f32) -> PathPoint {
        PathPoint::extrude(Vec3::new(x, y, z), ExtrusionRole::Perimeter, 0.4, 0.2)
    }

    #[test]
    fn test_sentinel_is_id_zero() {
        let index = VoxelIndex::empty(1.0, 0);
        assert_eq!(index.voxel_count(), 1);
        assert_eq!(index.coord(0), Some(SENTINEL_VOXEL));
        assert_eq!(index.bucket(0), Some(&[][..]));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut index = VoxelIndex::empty(1.0, 16);
        let cell = VoxelCoord::new(3, 4, 5);
        assert!(index.insert(cell, 7));
        assert!(index.insert(cell, 2));
        assert!(!index.insert(cell, 7));
        assert_eq!(index.bucket(1), Some(&[2, 7][..]));
        assert!(!index.insert(SENTINEL_VOXEL, 1));
        assert!(index.bucket(0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_segments_never_bucketed() {
        let points = [
            ex(0.5, 0.5, 0.5),
            ex(0.5, 0.5, 0.5), // zero-length
            ex(3.5, 0.5, 0.5),
            PathPoint::travel(Vec3::new(6.5, 0.5, 0.5)), // type change
            PathPoint::travel(Vec3::new(8.5, 0.5, 0.5)),
        ];
        let table = SegmentTable::build(&points, ValidityRule::Strict);
        let index = VoxelIndex::build(&points, &table, 1.0);

        for id in 0..index.voxel_count() as u32 {
            for &segment in index.bucket(id).unwrap() {
                assert!(table.is_valid(segment as usize), "segment {segment} in voxel {id}");
            }
        }
        assert_eq!(index.stats().segments_indexed, 2);
        assert_eq!(index.id_at(Vec3::new(2.2, 0.1, 0.9)), Some(3));
    }

    #[test]
    fn test_candidate_voxels() {
        let points = [ex(0.5, 0.5, 0.5), ex(1.5, 0.5, 0.5), ex(10.5, 0.5, 0.5)];
        let table = SegmentTable::build(&points, ValidityRule::Strict);
        let index = VoxelIndex::build(&points, &table, 1.0);
        // segment 0 covers x = 0..=1, segment 1 covers x = 1..=10
        assert_eq!(index.voxel_count(), 1 + 11);

        let only_first = BitSet::from_indices(table.len(), [0]);
        assert_eq!(index.candidate_voxels(&only_first), vec![1, 2]);

        let none = BitSet::new(table.len());
        assert!(index.candidate_voxels(&none).is_empty());
    }
}
