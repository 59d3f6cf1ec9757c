//! # Grid Traversal
//!
//! Incremental 3D DDA (Amanatides & Woo): walk from the cell holding one
//! endpoint to the cell holding the other, always crossing the nearest cell
//! boundary first.
//!
//! Two properties matter for the index:
//! - **Bounded**: the walk takes exactly `|Δx| + |Δy| + |Δz|` steps in cell
//!   space. An axis that already sits on its final cell is never stepped.
//! - **Symmetric**: endpoints are put in a canonical order first, so `A -> B`
//!   and `B -> A` visit the same cells in the same order.
//!
//! Grid math runs in `f64` to keep long segments far from the origin stable.

use glam::{DVec3, Vec3};

use super::coord::VoxelCoord;

/// Cells crossed by the segment `a -> b` on a grid of `voxel_size`.
#[must_use]
pub fn covered_voxels(a: Vec3, b: Vec3, voxel_size: f32) -> Vec<VoxelCoord> {
    let mut out = Vec::new();
    let size = f64::from(voxel_size);
    traverse_grid(a.as_dvec3() / size, b.as_dvec3() / size, &mut out);
    out
}

/// Appends the cells crossed between two grid-space points to `out`.
///
/// A zero component of the direction gives that axis an infinite boundary
/// distance: it never wins the "nearest boundary" comparison.
pub fn traverse_grid(a: DVec3, b: DVec3, out: &mut Vec<VoxelCoord>) {
    let (start, end) = if lexicographic_le(a, b) { (a, b) } else { (b, a) };

    let mut current = VoxelCoord::containing(start);
    let last = VoxelCoord::containing(end);
    let dir = end - start;

    let mut step = [0i32; 3];
    let mut t_max = [f64::INFINITY; 3];
    let mut t_delta = [f64::INFINITY; 3];

    for axis in 0..3 {
        let d = dir[axis];
        let origin = start[axis];
        let cell = f64::from(current.axis(axis));
        if d > 0.0 {
            step[axis] = 1;
            t_delta[axis] = 1.0 / d;
            t_max[axis] = (cell + 1.0 - origin) / d;
        } else if d < 0.0 {
            step[axis] = -1;
            t_delta[axis] = -1.0 / d;
            t_max[axis] = (cell - origin) / d;
        }
    }

    let steps = (0..3)
        .map(|axis| current.axis(axis).abs_diff(last.axis(axis)) as usize)
        .sum::<usize>();
    out.reserve(steps + 1);
    out.push(current);

    for _ in 0..steps {
        let mut best: Option<usize> = None;
        for axis in 0..3 {
            if step[axis] == 0 || current.axis(axis) == last.axis(axis) {
                continue;
            }
            if best.map_or(true, |b| t_max[axis] < t_max[b]) {
                best = Some(axis);
            }
        }
        let Some(axis) = best else {
            break;
        };
        *current.axis_mut(axis) += step[axis];
        t_max[axis] += t_delta[axis];
        out.push(current);
    }
}

fn lexicographic_le(a: DVec3, b: DVec3) -> bool {
    a.to_array()
        .iter()
        .zip(b.to_array().iter())
        .find(|(x, y)| x != y)
        .map_or(true, |(x, y)| x < y)
}
