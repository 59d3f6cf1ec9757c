//! # Dedup Benchmark
//!
//! Measures:
//! 1. Canonicalization of a full-HD id readback (coherent and noisy)
//! 2. Expansion of visible voxels to sorted segment lists
//!
//! Target: 1920x1080 coherent readback to visible set under 5ms.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use zeropath_culling::dedup::{canonicalize, expand_to_segments};
use zeropath_culling::VoxelIndex;
use zeropath_path::{random_walk, RandomWalkConfig, SegmentTable, ValidityRule};

const WIDTH: usize = 1920;
const HEIGHT: usize = 1080;

/// Screen-space tiles of equal ids, like a real raster of voxel boxes.
#[allow(clippy::cast_possible_truncation)]
fn coherent_ids(voxels: u32, tile: usize, seed: u64) -> Vec<u32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let tiles_x = WIDTH.div_ceil(tile);
    let tiles: Vec<u32> = (0..tiles_x * HEIGHT.div_ceil(tile))
        .map(|_| rng.gen_range(0..voxels))
        .collect();
    (0..WIDTH * HEIGHT)
        .map(|p| {
            let (x, y) = (p % WIDTH, p / WIDTH);
            tiles[(y / tile) * tiles_x + x / tile]
        })
        .collect()
}

fn noisy_ids(voxels: u32, seed: u64) -> Vec<u32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..WIDTH * HEIGHT).map(|_| rng.gen_range(0..voxels)).collect()
}

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_canonicalize");
    group.throughput(criterion::Throughput::Elements((WIDTH * HEIGHT) as u64));
    group.sample_size(30);

    for tile in [4usize, 16] {
        let ids = coherent_ids(50_000, tile, 1);
        group.bench_with_input(BenchmarkId::new("coherent", tile), &ids, |b, ids| {
            b.iter(|| {
                let mut work = ids.clone();
                canonicalize(&mut work);
                black_box(work.len());
            });
        });
    }

    let ids = noisy_ids(50_000, 2);
    group.bench_function("noisy", |b| {
        b.iter(|| {
            let mut work = ids.clone();
            canonicalize(&mut work);
            black_box(work.len());
        });
    });

    group.finish();
}

#[allow(clippy::cast_possible_truncation)]
fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_expand");
    let points = random_walk(
        &RandomWalkConfig {
            point_count: 500_000,
            max_step: 3.0,
            ..RandomWalkConfig::default()
        },
        3,
    );
    let table = SegmentTable::build(&points, ValidityRule::Strict);
    let index = VoxelIndex::build(&points, &table, 1.0);
    let candidates = table.enabled().clone();

    for percent in [5usize, 25, 100] {
        let count = (index.voxel_count() * percent / 100).max(1);
        let voxels: Vec<u32> = (0..count as u32).collect();
        group.bench_with_input(BenchmarkId::new("voxels_percent", percent), &voxels, |b, voxels| {
            b.iter(|| black_box(expand_to_segments(voxels, &index, &candidates).len()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_canonicalize, bench_expand);
criterion_main!(benches);
