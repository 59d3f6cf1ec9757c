//! The published answer of one culling cycle.

/// Sorted, duplicate-free segment indices considered on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalVisibleSet {
    segments: Vec<u32>,
    visible_voxels: usize,
    generation: u64,
}

impl CanonicalVisibleSet {
    /// An empty set.
    #[must_use]
    pub const fn empty(generation: u64) -> Self {
        Self {
            segments: Vec::new(),
            visible_voxels: 0,
            generation,
        }
    }

    /// Wraps an already canonical list.
    ///
    /// `segments` must be strictly ascending.
    #[must_use]
    pub fn from_sorted(segments: Vec<u32>, visible_voxels: usize, generation: u64) -> Self {
        debug_assert!(segments.windows(2).all(|w| w[0] < w[1]), "segments must be strictly ascending");
        Self {
            segments,
            visible_voxels,
            generation,
        }
    }

    /// Number of visible segments.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether nothing is visible.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segment indices, ascending.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.segments
    }

    /// Whether `segment` is visible.
    #[must_use]
    pub fn contains(&self, segment: u32) -> bool {
        self.segments.binary_search(&segment).is_ok()
    }

    /// Iterates the segment indices, ascending.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments.iter().copied()
    }

    /// Voxels that contributed at least one sample, sentinel excluded.
    #[inline]
    #[must_use]
    pub fn visible_voxels(&self) -> usize {
        self.visible_voxels
    }

    /// Candidate generation the set was computed against.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let set = CanonicalVisibleSet::from_sorted(vec![1, 4, 9], 2, 3);
        assert_eq!(set.len(), 3);
        assert!(set.contains(4));
        assert!(!set.contains(5));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 4, 9]);
        assert_eq!(set.generation(), 3);
        assert!(CanonicalVisibleSet::empty(0).is_empty());
    }
}
