//! # Culling Soak Run
//!
//! Headless run of the full pipeline on the CPU backend:
//! - layered-ring part (a stack of closed perimeters)
//! - orbiting camera, one `update` per simulated frame
//! - a draw thread reading the published set concurrently
//!
//! Passes if the draw thread never observes a torn set and the pipeline
//! keeps publishing while the camera moves.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use zeropath_core::TaskWorker;
use zeropath_culling::{
    CullingConfig, HostReadback, HostUpload, RenderableDataset, Resolution, SoftwareOracle,
};
use zeropath_path::{layered_rings, LayeredRingsConfig};

/// Soak parameters.
struct SoakConfig {
    /// Simulated frames.
    frames: u32,
    /// Main framebuffer size.
    framebuffer: Resolution,
    /// Polls before a readback reports ready.
    readback_latency: u32,
    /// Camera revolutions over the whole run.
    revolutions: f32,
    /// Seed of the generated part.
    seed: u64,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            framebuffer: Resolution::new(320, 180),
            readback_latency: 2, // two frames of device round trip
            revolutions: 2.0,
            seed: 42,
        }
    }
}

fn orbit(center: Vec3, radius: f32, angle: f32, aspect: f32) -> Mat4 {
    let eye = center + Vec3::new(angle.cos() * radius, radius * 0.6, angle.sin() * radius);
    let view = Mat4::look_at_rh(eye, center, Vec3::Y);
    let proj = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, radius * 10.0);
    proj * view
}

#[allow(clippy::cast_precision_loss)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let soak = SoakConfig::default();
    let config = CullingConfig::low_end();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    ZEROPATH CULLING SOAK RUN                     ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");

    let build_start = Instant::now();
    let points = layered_rings(&LayeredRingsConfig::default(), soak.seed);
    let worker = Arc::new(TaskWorker::spawn("zeropath-dedup")?);
    let mut dataset = RenderableDataset::load(
        points,
        &config,
        SoftwareOracle::new(config.oracle_resolution.resolve(soak.framebuffer)),
        HostReadback::with_latency(soak.readback_latency),
        HostUpload::new(),
        Arc::clone(&worker),
    )?;
    let build_time = build_start.elapsed();

    let Some(bounds) = dataset.bounds() else {
        println!("empty dataset, nothing to do");
        return Ok(());
    };
    let index_stats = dataset.index().stats();
    println!("┌─ Dataset ─────────────────────────────────────────────────────────┐");
    println!("│ Points:          {:>10}", dataset.points().len());
    println!("│ Valid segments:  {:>10}", dataset.table().valid_count());
    println!("│ Voxels:          {:>10}", index_stats.voxels);
    println!("│ Largest bucket:  {:>10}", index_stats.max_bucket);
    println!("│ Build time:      {:>10.2?}", build_time);
    println!("└───────────────────────────────────────────────────────────────────┘");

    // Draw thread: pins the front set and checks it stays consistent.
    let published = dataset.pipeline().published();
    let stop = Arc::new(AtomicBool::new(false));
    let torn = Arc::new(AtomicU64::new(0));
    let draws = Arc::new(AtomicU64::new(0));
    let draw_thread = {
        let (stop, torn, draws) = (Arc::clone(&stop), Arc::clone(&torn), Arc::clone(&draws));
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let front = published.read();
                let count = front.len();
                thread::yield_now();
                let sorted = front.as_slice().windows(2).all(|w| w[0] < w[1]);
                if front.as_slice().len() != count || !sorted {
                    torn.fetch_add(1, Ordering::Relaxed);
                }
                drop(front);
                draws.fetch_add(1, Ordering::Relaxed);
            }
        })
    };

    let aspect = soak.framebuffer.width as f32 / soak.framebuffer.height as f32;
    let radius = bounds.radius() * 2.5;
    let run_start = Instant::now();
    for frame in 0..soak.frames {
        let angle = frame as f32 / soak.frames as f32 * soak.revolutions * std::f32::consts::TAU;
        dataset.update(orbit(bounds.center(), radius, angle, aspect), soak.framebuffer)?;
        // Halfway through, scrub the sequential window back to 50%.
        if frame == soak.frames / 2 {
            dataset.update_filter(|f| {
                let half = f.range().global_max() / 2;
                f.update_range(|r| r.set_current_max(half));
            });
        }
        thread::sleep(Duration::from_micros(500));
    }
    let run_time = run_start.elapsed();

    stop.store(true, Ordering::Relaxed);
    let _ = draw_thread.join();

    let stats = dataset.stats();
    let worker_stats = worker.stats();
    let torn_reads = torn.load(Ordering::Relaxed);
    println!("┌─ Pipeline ────────────────────────────────────────────────────────┐");
    println!("│ Frames:             {:>8}", stats.frames);
    println!("│ Cycles started:     {:>8}", stats.cycles_started);
    println!("│ Frames skipped:     {:>8}", stats.frames_skipped);
    println!("│ Sets published:     {:>8}", stats.sets_published);
    println!("│ Readbacks dropped:  {:>8}", stats.readbacks_discarded);
    println!("│ Readback failures:  {:>8}", stats.readback_failures);
    println!("│ Dedup completed:    {:>8}", worker_stats.completed);
    println!("│ Dedup panicked:     {:>8}", worker_stats.panicked);
    println!("│ Last visible:       {:>8} segments in {} voxels", stats.last_visible_segments, stats.last_visible_voxels);
    println!("│ Candidate voxels:   {:>8}", stats.last_candidate_voxels);
    println!("│ Frame avg:          {:>8.3} ms", run_time.as_secs_f64() * 1000.0 / f64::from(soak.frames));
    println!("│ Draw reads:         {:>8}", draws.load(Ordering::Relaxed));
    println!("│ Torn reads:         {:>8}", torn_reads);
    println!("└───────────────────────────────────────────────────────────────────┘");

    let passed = torn_reads == 0 && stats.sets_published > 1;
    if passed {
        println!("✓ SOAK PASSED");
    } else {
        println!("✗ SOAK FAILED");
    }
    dataset.unload();
    if passed {
        Ok(())
    } else {
        Err("soak run failed".into())
    }
}
