//! Stress test for the visible-set handoff between the cycle and a draw
//! thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use zeropath_core::TaskWorker;
use zeropath_culling::{
    CullingConfig, HostReadback, HostUpload, RenderableDataset, Resolution, ResolutionPolicy, SoftwareOracle,
};
use zeropath_path::{random_walk, ExtrusionRole, PathPoint, RandomWalkConfig};

const FB: Resolution = Resolution::new(64, 48);

#[test]
fn test_draw_thread_never_sees_torn_or_older_sets() {
    let points = random_walk(
        &RandomWalkConfig {
            point_count: 2_000,
            max_step: 4.0,
            travel_probability: 0.1,
            ..RandomWalkConfig::default()
        },
        7,
    );
    let config = CullingConfig {
        voxel_size: 2.0,
        oracle_resolution: ResolutionPolicy::Scaled { factor: 0.5 },
        ..CullingConfig::default()
    };
    let mut dataset = RenderableDataset::load(
        points,
        &config,
        SoftwareOracle::new(config.oracle_resolution.resolve(FB)),
        HostReadback::with_latency(1),
        HostUpload::new(),
        Arc::new(TaskWorker::spawn("handoff-test").unwrap()),
    )
    .unwrap();
    let bounds = dataset.bounds().unwrap();
    let segment_slots = dataset.table().len();

    let published = dataset.pipeline().published();
    let stop = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicU64::new(0));
    let reader = {
        let (stop, reads) = (Arc::clone(&stop), Arc::clone(&reads));
        thread::spawn(move || {
            let mut last_generation = 0;
            while !stop.load(Ordering::Relaxed) {
                let front = published.read();
                assert!(front.generation() >= last_generation, "publication went backwards");
                last_generation = front.generation();

                let count = front.len();
                thread::yield_now();
                let slice = front.as_slice();
                assert_eq!(slice.len(), count);
                assert!(slice.windows(2).all(|w| w[0] < w[1]), "published set not canonical");
                assert!(slice.iter().all(|&s| (s as usize) < segment_slots));
                drop(front);
                reads.fetch_add(1, Ordering::Relaxed);
            }
        })
    };

    let radius = bounds.radius() * 2.0;
    for frame in 0..400u32 {
        let angle = frame as f32 * 0.05;
        let eye = bounds.center() + Vec3::new(angle.cos() * radius, radius * 0.5, angle.sin() * radius);
        let view_proj = Mat4::perspective_rh(50f32.to_radians(), 4.0 / 3.0, 0.1, radius * 10.0)
            * Mat4::look_at_rh(eye, bounds.center(), Vec3::Y);
        dataset.update(view_proj, FB).unwrap();
        if frame % 97 == 0 {
            dataset.update_filter(|f| f.update_range(|r| r.decrease_current_max(50)));
        }
        if frame % 5 == 0 {
            thread::yield_now();
        }
    }

    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    assert!(reads.load(Ordering::Relaxed) > 0);
    assert!(dataset.stats().sets_published > 1);
    for segment in dataset.visible().iter() {
        assert!(dataset.table().is_valid(segment as usize));
    }
}

#[test]
fn test_long_draw_does_not_stall_update() {
    let points = vec![
        PathPoint::extrude(Vec3::new(0.2, 0.5, 0.5), ExtrusionRole::Perimeter, 0.45, 0.2),
        PathPoint::extrude(Vec3::new(0.8, 0.5, 0.5), ExtrusionRole::Perimeter, 0.45, 0.2),
    ];
    let config = CullingConfig {
        voxel_size: 1.0,
        ..CullingConfig::default()
    };
    let mut dataset = RenderableDataset::load(
        points,
        &config,
        SoftwareOracle::new(FB),
        HostReadback::new(),
        HostUpload::new(),
        Arc::new(TaskWorker::spawn("long-draw-test").unwrap()),
    )
    .unwrap();
    let target = Vec3::splat(0.5);
    let view_proj = Mat4::perspective_rh(20f32.to_radians(), 4.0 / 3.0, 0.1, 100.0)
        * Mat4::look_at_rh(target + Vec3::Z * 10.0, target, Vec3::Y);

    // A draw that keeps the front slot pinned far longer than a frame.
    let published = dataset.pipeline().published();
    let (pinned_tx, pinned_rx) = mpsc::channel();
    let draw = thread::spawn(move || {
        let front = published.read();
        pinned_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(600));
        front.generation()
    });
    pinned_rx.recv().unwrap();

    let mut worst = Duration::ZERO;
    for _ in 0..60 {
        let start = Instant::now();
        dataset.update(view_proj, FB).unwrap();
        worst = worst.max(start.elapsed());
        thread::sleep(Duration::from_millis(2));
    }
    assert!(worst < Duration::from_millis(100), "update blocked for {worst:?}");
    assert_eq!(draw.join().unwrap(), 0);

    let stats = dataset.stats();
    assert!(stats.sets_published >= 1);
    assert!(stats.handoffs_deferred > 0);
    assert_eq!(dataset.visible().as_slice(), &[0]);
}
