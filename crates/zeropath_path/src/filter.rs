//! # Candidate Filter
//!
//! Candidates are the segments the culling cycle may draw:
//!
//! ```text
//! candidates = enabled ∧ role/type eligible ∧ inside the sequential window
//! ```
//!
//! Every effective change bumps [`CandidateFilter::generation`]; the culling
//! pipeline compares generations to know when to restart its cycle.

use zeropath_core::{BitSet, SequentialRange};

use crate::flags::{ExtrusionRole, MoveType};
use crate::point::PathPoint;
use crate::segment::SegmentTable;

/// Role, move type and sequential-window selection over segments.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    roles: [bool; ExtrusionRole::COUNT],
    move_types: [bool; MoveType::COUNT],
    range: SequentialRange,
    generation: u64,
}

impl CandidateFilter {
    /// A filter over `segment_count` slots with everything eligible.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(segment_count: usize) -> Self {
        Self {
            roles: [true; ExtrusionRole::COUNT],
            move_types: [true; MoveType::COUNT],
            range: SequentialRange::new(0, segment_count.min(u32::MAX as usize) as u32),
            generation: 0,
        }
    }

    /// Bumped on every change that can alter the candidate set.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The sequential window.
    #[inline]
    #[must_use]
    pub fn range(&self) -> &SequentialRange {
        &self.range
    }

    /// Whether segments of `role` are eligible.
    #[inline]
    #[must_use]
    pub fn role_enabled(&self, role: ExtrusionRole) -> bool {
        self.roles[role as usize]
    }

    /// Whether segments of `move_type` are eligible.
    #[inline]
    #[must_use]
    pub fn move_type_enabled(&self, move_type: MoveType) -> bool {
        self.move_types[move_type as usize]
    }

    /// Toggles a role.
    pub fn set_role_enabled(&mut self, role: ExtrusionRole, enabled: bool) {
        let slot = &mut self.roles[role as usize];
        if *slot != enabled {
            *slot = enabled;
            self.generation += 1;
        }
    }

    /// Toggles a move type.
    pub fn set_move_type_enabled(&mut self, move_type: MoveType, enabled: bool) {
        let slot = &mut self.move_types[move_type as usize];
        if *slot != enabled {
            *slot = enabled;
            self.generation += 1;
        }
    }

    /// Mutates the sequential window; bumps the generation if it moved.
    ///
    /// ```rust
    /// # use zeropath_path::CandidateFilter;
    /// let mut filter = CandidateFilter::new(1000);
    /// filter.update_range(|r| r.decrease_current_max(100));
    /// assert_eq!(filter.range().current_max(), 899);
    /// assert_eq!(filter.generation(), 1);
    /// ```
    pub fn update_range(&mut self, f: impl FnOnce(&mut SequentialRange)) {
        let before = self.range;
        f(&mut self.range);
        if self.range != before {
            self.generation += 1;
        }
    }

    /// Whether the point starting a segment passes the role/type toggles.
    /// Unknown role or type bits are never eligible.
    #[must_use]
    pub fn accepts(&self, point: &PathPoint) -> bool {
        let role_ok = point.flags.role().is_some_and(|r| self.role_enabled(r));
        let type_ok = point
            .flags
            .move_type()
            .is_some_and(|t| self.move_type_enabled(t));
        role_ok && type_ok
    }

    /// Builds the candidate mask.
    #[must_use]
    pub fn candidates(&self, points: &[PathPoint], table: &SegmentTable) -> BitSet {
        let mut out = BitSet::new(table.len());
        let Some(window) = self.range.as_range() else {
            return out;
        };
        for index in table.valid_indices() {
            let in_window = u32::try_from(index).is_ok_and(|i| window.contains(&i));
            if in_window && points.get(index).is_some_and(|p| self.accepts(p)) {
                out.set(index);
            }
        }
        out
    }
}
