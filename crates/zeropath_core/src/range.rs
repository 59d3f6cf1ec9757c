//! # Sequential Range
//!
//! The progressive "current window" over the ordered segment sequence.
//!
//! The domain is `[global_min, global_max)`; the window `[current_min,
//! current_max]` is inclusive on both ends. Every mutation clamps at the
//! domain boundary and drags the opposite bound along instead of letting the
//! window invert. An empty domain yields an empty window.

use std::ops::RangeInclusive;

/// Clamped inclusive window over segment indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialRange {
    global_min: u32,
    global_max: u32,
    current_min: u32,
    current_max: u32,
}

impl Default for SequentialRange {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl SequentialRange {
    /// Creates a range over `[global_min, global_max)` with the window
    /// covering the whole domain.
    ///
    /// A reversed domain is treated as empty.
    #[must_use]
    pub fn new(global_min: u32, global_max: u32) -> Self {
        let global_max = global_max.max(global_min);
        let mut range = Self {
            global_min,
            global_max,
            current_min: global_min,
            current_max: global_min,
        };
        range.reset();
        range
    }

    /// Lower bound of the domain (inclusive).
    #[inline]
    #[must_use]
    pub const fn global_min(&self) -> u32 {
        self.global_min
    }

    /// Upper bound of the domain (exclusive).
    #[inline]
    #[must_use]
    pub const fn global_max(&self) -> u32 {
        self.global_max
    }

    /// First index inside the window.
    #[inline]
    #[must_use]
    pub const fn current_min(&self) -> u32 {
        self.current_min
    }

    /// Last index inside the window.
    #[inline]
    #[must_use]
    pub const fn current_max(&self) -> u32 {
        self.current_max
    }

    /// Returns `true` if the domain holds no index.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.global_max == self.global_min
    }

    /// Number of indices inside the window.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.current_max - self.current_min + 1
        }
    }

    /// Returns whether `index` lies inside the window.
    #[inline]
    #[must_use]
    pub const fn contains(&self, index: u32) -> bool {
        !self.is_empty() && index >= self.current_min && index <= self.current_max
    }

    /// The window as a range, or `None` for an empty domain.
    #[must_use]
    pub fn as_range(&self) -> Option<RangeInclusive<u32>> {
        (!self.is_empty()).then(|| self.current_min..=self.current_max)
    }

    /// Largest index inside the domain.
    #[inline]
    const fn last(&self) -> u32 {
        if self.is_empty() {
            self.global_min
        } else {
            self.global_max - 1
        }
    }

    /// Widens the window to the whole domain.
    pub fn reset(&mut self) {
        self.current_min = self.global_min;
        self.current_max = self.last();
    }

    /// Moves the lower bound to `value`, clamped to the domain. The upper
    /// bound follows if it would fall below.
    pub fn set_current_min(&mut self, value: u32) {
        self.current_min = value.clamp(self.global_min, self.last());
        if self.current_max < self.current_min {
            self.current_max = self.current_min;
        }
    }

    /// Moves the upper bound to `value`, clamped to the domain. The lower
    /// bound follows if it would rise above.
    pub fn set_current_max(&mut self, value: u32) {
        self.current_max = value.clamp(self.global_min, self.last());
        if self.current_min > self.current_max {
            self.current_min = self.current_max;
        }
    }

    /// Advances the lower bound by `step`.
    pub fn increase_current_min(&mut self, step: u32) {
        self.set_current_min(self.current_min.saturating_add(step));
    }

    /// Retreats the lower bound by `step`.
    pub fn decrease_current_min(&mut self, step: u32) {
        self.set_current_min(self.current_min.saturating_sub(step));
    }

    /// Advances the upper bound by `step`.
    pub fn increase_current_max(&mut self, step: u32) {
        self.set_current_max(self.current_max.saturating_add(step));
    }

    /// Retreats the upper bound by `step`.
    pub fn decrease_current_max(&mut self, step: u32) {
        self.set_current_max(self.current_max.saturating_sub(step));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn assert_invariants(range: &SequentialRange) {
        assert!(range.current_min() <= range.current_max(), "{range:?}");
        if !range.is_empty() {
            assert!(range.current_min() >= range.global_min(), "{range:?}");
            assert!(range.current_max() < range.global_max(), "{range:?}");
        }
    }

    #[test]
    fn test_new_covers_domain() {
        let range = SequentialRange::new(0, 100);
        assert_eq!(range.current_min(), 0);
        assert_eq!(range.current_max(), 99);
        assert_eq!(range.size(), 100);
        assert_eq!(range.as_range(), Some(0..=99));
    }

    #[test]
    fn test_min_pushes_max() {
        let mut range = SequentialRange::new(0, 100);
        range.set_current_max(10);
        range.increase_current_min(25);
        assert_eq!(range.current_min(), 25);
        assert_eq!(range.current_max(), 25);
        assert_eq!(range.size(), 1);
    }

    #[test]
    fn test_max_pushes_min() {
        let mut range = SequentialRange::new(10, 50);
        range.set_current_min(40);
        range.decrease_current_max(100);
        assert_eq!(range.current_max(), 10);
        assert_eq!(range.current_min(), 10);
    }

    #[test]
    fn test_clamps_at_boundaries() {
        let mut range = SequentialRange::new(5, 20);
        range.decrease_current_min(1000);
        assert_eq!(range.current_min(), 5);
        range.increase_current_max(u32::MAX);
        assert_eq!(range.current_max(), 19);
        range.increase_current_min(u32::MAX);
        assert_eq!(range.current_min(), 19);
        assert!(range.contains(19));
        assert!(!range.contains(18));
    }

    #[test]
    fn test_empty_domain() {
        let mut range = SequentialRange::new(7, 7);
        assert!(range.is_empty());
        assert_eq!(range.size(), 0);
        assert_eq!(range.as_range(), None);
        range.increase_current_max(3);
        range.decrease_current_min(3);
        assert_eq!(range.size(), 0);
        assert!(!range.contains(7));

        let reversed = SequentialRange::new(9, 2);
        assert!(reversed.is_empty());
    }

    #[test]
    fn test_random_sequences_keep_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5EC0);
        for _ in 0..200 {
            let lo = rng.gen_range(0..50);
            let hi = lo + rng.gen_range(0..200);
            let mut range = SequentialRange::new(lo, hi);
            for _ in 0..100 {
                let step = if rng.gen_bool(0.2) { 100 } else { 1 };
                match rng.gen_range(0..6) {
                    0 => range.increase_current_min(step),
                    1 => range.decrease_current_min(step),
                    2 => range.increase_current_max(step),
                    3 => range.decrease_current_max(step),
                    4 => range.set_current_min(rng.gen_range(0..300)),
                    _ => range.set_current_max(rng.gen_range(0..300)),
                }
                assert_invariants(&range);
            }
        }
    }
}
