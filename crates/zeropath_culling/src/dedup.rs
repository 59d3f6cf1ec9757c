//! # Canonicalization
//!
//! Turns a raw id readback into the published visible set. Runs on the
//! task worker, never on the render thread.
//!
//! ```text
//!   raw ids (one per pixel) ──compact──> sort ──compact──> unique voxel ids
//!                                                               │
//!        sorted segment list <── enumerate <── AtomicBitSet <───┘ (rayon, per voxel bucket)
//! ```
//!
//! The first compaction is a cheap pre-filter: neighbouring pixels mostly
//! hit the same voxel, so it shrinks the sort input by a large factor.

use rayon::prelude::*;
use zeropath_core::{AtomicBitSet, BitSet, SetBits};

use crate::readback::RawVisibleIds;
use crate::visible_set::CanonicalVisibleSet;
use crate::voxel::VoxelIndex;

/// Removes runs of equal neighbours in place. Returns the compacted length;
/// elements past it are unspecified.
pub fn compact_consecutive(ids: &mut [u32]) -> usize {
    if ids.is_empty() {
        return 0;
    }
    let mut write = 1;
    for read in 1..ids.len() {
        if ids[read] != ids[write - 1] {
            ids[write] = ids[read];
            write += 1;
        }
    }
    write
}

/// Reduces `ids` to its sorted distinct values. Never leaves it empty: an
/// empty input becomes `[0]`.
pub fn canonicalize(ids: &mut Vec<u32>) {
    if ids.is_empty() {
        ids.push(0);
    }
    let len = compact_consecutive(ids);
    ids.truncate(len);
    ids.par_sort_unstable();
    let len = compact_consecutive(ids);
    ids.truncate(len);
}

/// Unions the buckets of `voxels`, keeping only segments in `candidates`.
///
/// Unknown voxel ids are ignored. Output is ascending.
#[must_use]
pub fn expand_to_segments(voxels: &[u32], index: &VoxelIndex, candidates: &BitSet) -> Vec<u32> {
    let marks = AtomicBitSet::new(candidates.bit_len());
    voxels.par_iter().for_each(|&voxel| {
        let Some(bucket) = index.bucket(voxel) else {
            return;
        };
        for &segment in bucket {
            if candidates.test(segment as usize) {
                marks.set_atomic(segment as usize);
            }
        }
    });

    let mut out = Vec::new();
    marks.enumerate_set_indices(&mut out);
    out
}

/// Full canonicalization task: raw readback to published set.
#[must_use]
pub fn build_visible_set(
    raw: RawVisibleIds,
    index: &VoxelIndex,
    candidates: &BitSet,
    generation: u64,
) -> CanonicalVisibleSet {
    let mut voxels = raw.into_vec();
    canonicalize(&mut voxels);
    let visible_voxels = voxels.iter().filter(|&&id| id != 0).count();
    let segments = expand_to_segments(&voxels, index, candidates);
    tracing::trace!(visible_voxels, segments = segments.len(), generation, "visible set canonicalized");
    CanonicalVisibleSet::from_sorted(segments, visible_voxels, generation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::VoxelCoord;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    #[test]
    fn test_compact_consecutive() {
        let mut ids = vec![3, 3, 1, 1, 1, 3, 2, 2];
        let len = compact_consecutive(&mut ids);
        assert_eq!(&ids[..len], &[3, 1, 3, 2]);
        assert_eq!(compact_consecutive(&mut []), 0);
    }

    #[test]
    fn test_canonicalize_edge_cases() {
        let mut empty = Vec::new();
        canonicalize(&mut empty);
        assert_eq!(empty, vec![0]);

        let mut same = vec![5; 1000];
        canonicalize(&mut same);
        assert_eq!(same, vec![5]);

        let mut sorted = vec![1, 2, 3, 9];
        canonicalize(&mut sorted);
        assert_eq!(sorted, vec![1, 2, 3, 9]);
    }

    #[test]
    fn test_canonicalize_matches_set_semantics() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..200 {
            let len = rng.gen_range(0..2000);
            let mut ids: Vec<u32> = (0..len).map(|_| rng.gen_range(0..64)).collect();
            let mut expected: Vec<u32> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
            if expected.is_empty() {
                expected.push(0);
            }
            canonicalize(&mut ids);
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_expand_respects_candidates() {
        let mut index = VoxelIndex::empty(1.0, 8);
        index.insert(VoxelCoord::new(0, 0, 0), 1);
        index.insert(VoxelCoord::new(0, 0, 0), 4);
        index.insert(VoxelCoord::new(1, 0, 0), 4);
        index.insert(VoxelCoord::new(1, 0, 0), 6);

        let all = BitSet::full(8);
        assert_eq!(expand_to_segments(&[0, 1, 2], &index, &all), vec![1, 4, 6]);

        let some = BitSet::from_indices(8, [4, 6]);
        assert_eq!(expand_to_segments(&[1], &index, &some), vec![4]);
        assert!(expand_to_segments(&[0, 99], &index, &all).is_empty());
    }

    #[test]
    fn test_build_visible_set_from_pixels() {
        let mut index = VoxelIndex::empty(1.0, 4);
        index.insert(VoxelCoord::new(0, 0, 0), 2);
        index.insert(VoxelCoord::new(5, 0, 0), 0);

        let raw = RawVisibleIds(vec![0, 0, 2, 2, 2, 0, 2, 0]);
        let set = build_visible_set(raw, &index, &BitSet::full(4), 7);
        assert_eq!(set.as_slice(), &[0]);
        assert_eq!(set.visible_voxels(), 1);
        assert_eq!(set.generation(), 7);

        let nothing = build_visible_set(RawVisibleIds::default(), &index, &BitSet::full(4), 7);
        assert!(nothing.is_empty());
    }
}
