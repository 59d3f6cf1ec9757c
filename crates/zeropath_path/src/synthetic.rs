//! # Synthetic Paths
//!
//! Deterministic datasets for tests, benches and the soak run. Same seed,
//! same points.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::flags::{ExtrusionRole, MoveType};
use crate::point::PathPoint;

/// Parameters of [`random_walk`].
#[derive(Debug, Clone)]
pub struct RandomWalkConfig {
    /// Number of points.
    pub point_count: usize,
    /// Maximum per-axis displacement between consecutive points.
    pub max_step: f32,
    /// Smallest extrusion height.
    pub min_thickness: f32,
    /// Largest extrusion height.
    pub max_thickness: f32,
    /// Probability that a point is a travel move instead of an extrusion.
    pub travel_probability: f64,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            point_count: 50,
            max_step: 50.0,
            min_thickness: 0.05,
            max_thickness: 2.0,
            travel_probability: 0.0,
        }
    }
}

/// Random walk of extruding moves with random roles.
///
/// Starts in the `z = 0` plane, then wanders on all three axes.
#[must_use]
pub fn random_walk(config: &RandomWalkConfig, seed: u64) -> Vec<PathPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let step = config.max_step.abs().max(f32::EPSILON);
    let thickness_hi = config.max_thickness.max(config.min_thickness + f32::EPSILON);

    let mut last = Vec3::new(rng.gen_range(-step..step), rng.gen_range(-step..step), 0.0);
    let mut points = Vec::with_capacity(config.point_count);

    for _ in 0..config.point_count {
        let position = last
            + Vec3::new(
                rng.gen_range(-step..step),
                rng.gen_range(-step..step),
                rng.gen_range(-step..step),
            );
        let point = if rng.gen_bool(config.travel_probability.clamp(0.0, 1.0)) {
            PathPoint::travel(position)
        } else {
            let role = ExtrusionRole::ALL[rng.gen_range(1..=12)];
            let thickness = rng.gen_range(config.min_thickness..thickness_hi);
            PathPoint::extrude(position, role, thickness, thickness)
        };
        points.push(point);
        last = position;
    }
    points
}

/// Parameters of [`layered_rings`].
#[derive(Debug, Clone)]
pub struct LayeredRingsConfig {
    /// Number of layers stacked along `+z`.
    pub layers: usize,
    /// Concentric rings per layer.
    pub rings: usize,
    /// Points per ring.
    pub points_per_ring: usize,
    /// Radius of the outermost ring.
    pub outer_radius: f32,
    /// Distance between rings.
    pub ring_spacing: f32,
    /// Layer height.
    pub layer_height: f32,
}

impl Default for LayeredRingsConfig {
    fn default() -> Self {
        Self {
            layers: 40,
            rings: 6,
            points_per_ring: 64,
            outer_radius: 40.0,
            ring_spacing: 1.5,
            layer_height: 0.3,
        }
    }
}

/// A stack of closed concentric perimeters joined by travel moves.
///
/// The outer rings occlude the inner ones from any side view, which makes
/// this the shape of choice for exercising occlusion. `seed` jitters the
/// ring start angle per layer.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn layered_rings(config: &LayeredRingsConfig, seed: u64) -> Vec<PathPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let per_ring = config.points_per_ring.max(3);
    let mut points = Vec::with_capacity(config.layers * config.rings * (per_ring + 3));

    for layer in 0..config.layers {
        let z = layer as f32 * config.layer_height;
        let phase: f32 = rng.gen_range(0.0..std::f32::consts::TAU);

        for ring in 0..config.rings {
            let radius = (config.outer_radius - ring as f32 * config.ring_spacing).max(0.1);
            let role = if ring == 0 {
                ExtrusionRole::ExternalPerimeter
            } else {
                ExtrusionRole::Perimeter
            };
            let at = |k: usize| {
                let angle = phase + std::f32::consts::TAU * (k % per_ring) as f32 / per_ring as f32;
                Vec3::new(radius * angle.cos(), radius * angle.sin(), z)
            };

            points.push(PathPoint::travel(at(0)));
            // Unretract in place, as a slicer does before each perimeter.
            points.push(PathPoint::with_type(at(0), MoveType::Unretract));
            for k in 0..=per_ring {
                points.push(PathPoint::extrude(at(k), role, 0.45, config.layer_height));
            }
        }
    }
    points
}
