//! # Bit Set Benchmark
//!
//! Measures:
//! 1. Set-bit enumeration at sparse and dense occupancy
//! 2. Parallel-style atomic marking versus plain marking
//!
//! Target: enumeration of 4M segments at 5% occupancy under 1ms.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use zeropath_core::{AtomicBitSet, BitSet, SetBits};

const SEGMENTS: usize = 4_000_000;

fn random_set(occupancy: f64, seed: u64) -> BitSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut set = BitSet::new(SEGMENTS);
    for i in 0..SEGMENTS {
        if rng.gen_bool(occupancy) {
            set.set(i);
        }
    }
    set
}

fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitset_enumerate");
    let mut out = Vec::with_capacity(SEGMENTS);

    for percent in [1u32, 5, 50] {
        let set = random_set(f64::from(percent) / 100.0, u64::from(percent));
        group.throughput(criterion::Throughput::Elements(SEGMENTS as u64));
        group.bench_with_input(BenchmarkId::new("enumerate", percent), &set, |b, set| {
            b.iter(|| {
                set.enumerate_set_indices(&mut out);
                black_box(out.len());
            });
        });
    }

    group.finish();
}

fn bench_marking(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitset_marking");
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let indices: Vec<usize> = (0..200_000).map(|_| rng.gen_range(0..SEGMENTS)).collect();

    group.bench_function("plain_set", |b| {
        let mut set = BitSet::new(SEGMENTS);
        b.iter(|| {
            for &i in &indices {
                set.set(i);
            }
            black_box(set.count_ones());
        });
    });

    group.bench_function("atomic_set", |b| {
        let set = AtomicBitSet::new(SEGMENTS);
        b.iter(|| {
            for &i in &indices {
                black_box(set.set_atomic(i));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_enumerate, bench_marking);
criterion_main!(benches);
