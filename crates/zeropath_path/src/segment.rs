//! # Segment Validity
//!
//! Segment `i` joins point `i` to point `i + 1`. The table holds one slot per
//! point; the last slot never has a successor and is always invalid.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use zeropath_core::{BitSet, SetBits};

use crate::point::PathPoint;

/// Decides whether two consecutive points form a drawable segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityRule {
    /// The next point exists and sits at a different position.
    Basic,
    /// [`ValidityRule::Basic`], plus both points share a move type and that
    /// type is not a marker that never connects.
    #[default]
    Strict,
}

impl ValidityRule {
    /// Whether `from -> to` forms a segment under this rule.
    #[must_use]
    pub fn connects(self, from: &PathPoint, to: &PathPoint) -> bool {
        if from.position == to.position {
            return false;
        }
        match self {
            Self::Basic => true,
            Self::Strict => {
                from.flags.type_bits() == to.flags.type_bits()
                    && from.flags.move_type().is_some_and(|t| !t.is_marker())
            }
        }
    }
}

/// Per-load record of which segment indices are drawable.
#[derive(Debug, Clone)]
pub struct SegmentTable {
    enabled: BitSet,
    valid_count: usize,
    rule: ValidityRule,
}

impl SegmentTable {
    /// Evaluates `rule` over every consecutive pair of `points`.
    #[must_use]
    pub fn build(points: &[PathPoint], rule: ValidityRule) -> Self {
        let mut enabled = BitSet::new(points.len());
        for (i, pair) in points.windows(2).enumerate() {
            if rule.connects(&pair[0], &pair[1]) {
                enabled.set(i);
            }
        }
        let valid_count = enabled.count_ones();
        Self {
            enabled,
            valid_count,
            rule,
        }
    }

    /// Number of segment slots (one per point).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.enabled.bit_len()
    }

    /// `true` if there are no slots at all.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of valid segments.
    #[inline]
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    /// Rule the table was built with.
    #[inline]
    #[must_use]
    pub fn rule(&self) -> ValidityRule {
        self.rule
    }

    /// Whether segment `index` is drawable.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, index: usize) -> bool {
        self.enabled.test(index)
    }

    /// The enabled-segment mask.
    #[inline]
    #[must_use]
    pub fn enabled(&self) -> &BitSet {
        &self.enabled
    }

    /// Iterates valid segment indices, ascending.
    pub fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.enabled.iter_ones()
    }

    /// Endpoints of segment `index`, or `None` if it is not valid.
    #[must_use]
    pub fn endpoints(&self, points: &[PathPoint], index: usize) -> Option<(Vec3, Vec3)> {
        if !self.is_valid(index) {
            return None;
        }
        Some((points.get(index)?.position, points.get(index + 1)?.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{ExtrusionRole, MoveType};

    fn extrude(x: f32) -> PathPoint {
        PathPoint::extrude(Vec3::new(x, 0.0, 0.0), ExtrusionRole::Perimeter, 0.4, 0.2)
    }

    #[test]
    fn test_last_point_never_valid() {
        let points = [extrude(0.0), extrude(1.0), extrude(2.0)];
        let table = SegmentTable::build(&points, ValidityRule::Strict);
        assert_eq!(table.len(), 3);
        assert_eq!(table.valid_indices().collect::<Vec<_>>(), vec![0, 1]);
        assert!(!table.is_valid(2));
        assert!(table.endpoints(&points, 2).is_none());
        assert_eq!(
            table.endpoints(&points, 1),
            Some((Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)))
        );
    }

    #[test]
    fn test_zero_length_segment_invalid() {
        let points = [extrude(0.0), extrude(0.0), extrude(1.0)];
        for rule in [ValidityRule::Basic, ValidityRule::Strict] {
            let table = SegmentTable::build(&points, rule);
            assert!(!table.is_valid(0), "{rule:?}");
            assert!(table.is_valid(1), "{rule:?}");
        }
    }

    #[test]
    fn test_strict_rejects_type_changes_and_markers() {
        let points = [
            extrude(0.0),
            PathPoint::travel(Vec3::new(1.0, 0.0, 0.0)),
            PathPoint::travel(Vec3::new(2.0, 0.0, 0.0)),
            PathPoint::with_type(Vec3::new(3.0, 0.0, 0.0), MoveType::Retract),
            PathPoint::with_type(Vec3::new(4.0, 0.0, 0.0), MoveType::Retract),
            extrude(5.0),
        ];

        let basic = SegmentTable::build(&points, ValidityRule::Basic);
        assert_eq!(basic.valid_count(), 5);

        let strict = SegmentTable::build(&points, ValidityRule::Strict);
        assert_eq!(strict.valid_indices().collect::<Vec<_>>(), vec![1]);
        assert_eq!(strict.rule(), ValidityRule::Strict);
    }

    #[test]
    fn test_empty_and_single() {
        let table = SegmentTable::build(&[], ValidityRule::Basic);
        assert!(table.is_empty());
        assert_eq!(table.valid_count(), 0);

        let table = SegmentTable::build(&[extrude(1.0)], ValidityRule::Basic);
        assert_eq!(table.len(), 1);
        assert_eq!(table.valid_count(), 0);
    }
}
