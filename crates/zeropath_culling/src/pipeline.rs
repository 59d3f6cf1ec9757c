//! # Culling Pipeline
//!
//! Drives one visibility cycle at a time, advanced once per frame by
//! [`CullingPipeline::update`]. Nothing in here ever waits: every fence,
//! transfer and worker task is polled, and a frame that finds the previous
//! cycle unfinished simply keeps drawing the published set.
//!
//! ```text
//!  frame N     rasterize(candidates) ─> begin readback
//!  frame N+k   readback ready? ─> map ─> enqueue dedup ─> rasterize again ─> begin readback
//!  frame N+k+j dedup ready? ─> upload into back ─> upload fence? ─> swap (publish)
//! ```
//!
//! A cycle starts only when the rasterization and upload fences have
//! signaled, no dedup task is in flight and the previous readback (if any)
//! is ready. Changing the candidate set, the oracle resolution or the
//! occlusion toggle bypasses that guard once and restarts from scratch;
//! work tied to the old state is discarded, never published.
//!
//! Publication never waits on the draw pass either: if a reader still pins
//! the back slot, the finished set stays pending and the handoff is retried
//! on the next frame.

use std::sync::Arc;

use glam::Mat4;
use zeropath_core::{BitSet, DoubleBuffer, Fence, FrontRead, SetBits, TaskHandle, TaskState, TaskWorker};

use crate::config::CullingConfig;
use crate::dedup::build_visible_set;
use crate::error::{CullingError, CullingResult};
use crate::oracle::{RasterRequest, Resolution, VisibilityOracle};
use crate::readback::{AsyncReadback, ReadbackTicket};
use crate::upload::VisibleSetUpload;
use crate::visible_set::CanonicalVisibleSet;
use crate::voxel::VoxelIndex;

/// What [`CullingPipeline::update`] did this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The previous cycle is still running; nothing was submitted.
    Skipped,
    /// A rasterization was submitted and its readback issued.
    Started,
    /// No candidate voxels: the oracle was not invoked and the published
    /// set becomes empty.
    NoCandidates,
    /// Occlusion is disabled; every candidate is published.
    Passthrough,
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CullingStats {
    /// Calls to `update`.
    pub frames: u64,
    /// Rasterizations submitted.
    pub cycles_started: u64,
    /// Frames that found the previous cycle unfinished.
    pub frames_skipped: u64,
    /// Readbacks that failed to map.
    pub readback_failures: u64,
    /// Readbacks dropped because their cycle went stale.
    pub readbacks_discarded: u64,
    /// Dedup tasks that panicked or were lost.
    pub failed_tasks: u64,
    /// Visible sets swapped to the front.
    pub sets_published: u64,
    /// Handoffs postponed because a reader still pinned the back slot.
    pub handoffs_deferred: u64,
    /// Tasks waiting on the shared worker at the last frame.
    pub worker_backlog: usize,
    /// Frames in a row where our dedup task sat behind other queued work.
    pub worker_stalled_frames: u64,
    /// Visible voxels of the last published set.
    pub last_visible_voxels: usize,
    /// Segments of the last published set.
    pub last_visible_segments: usize,
    /// Candidate voxels of the current candidate set.
    pub last_candidate_voxels: usize,
}

/// Consecutive stalled frames before the worker backlog is reported.
const WORKER_STALL_WARN_FRAMES: u64 = 240;

struct Candidates {
    generation: u64,
    segments: Arc<BitSet>,
    voxels: Vec<u32>,
}

struct InFlight {
    ticket: ReadbackTicket,
    generation: u64,
}

/// Orchestrates oracle, readback, dedup worker and double-buffered handoff
/// for one dataset.
pub struct CullingPipeline<O, R, U>
where
    O: VisibilityOracle,
    R: AsyncReadback<Source = O::Output>,
    U: VisibleSetUpload,
{
    oracle: O,
    readback: R,
    upload: U,
    worker: Arc<TaskWorker>,
    index: Arc<VoxelIndex>,
    published: Arc<DoubleBuffer<CanonicalVisibleSet>>,
    config: CullingConfig,
    candidates: Candidates,
    raster_fence: Fence,
    upload_fence: Fence,
    in_flight: Option<InFlight>,
    dedup: Option<TaskHandle<CanonicalVisibleSet>>,
    dedup_stale: bool,
    pending: Option<CanonicalVisibleSet>,
    back_ready: bool,
    restart: bool,
    stats: CullingStats,
}

impl<O, R, U> CullingPipeline<O, R, U>
where
    O: VisibilityOracle,
    R: AsyncReadback<Source = O::Output>,
    U: VisibleSetUpload,
{
    /// Creates a pipeline over `index` with an initial candidate set.
    ///
    /// The oracle must already hold the proxy mesh of `index`. Nothing is
    /// visible until the first cycle completes.
    pub fn new(
        oracle: O,
        readback: R,
        upload: U,
        worker: Arc<TaskWorker>,
        index: Arc<VoxelIndex>,
        config: CullingConfig,
        candidates: (u64, BitSet),
    ) -> Self {
        let (generation, segments) = candidates;
        let voxels = index.candidate_voxels(&segments);
        let stats = CullingStats {
            last_candidate_voxels: voxels.len(),
            ..CullingStats::default()
        };
        Self {
            oracle,
            readback,
            upload,
            worker,
            index,
            published: Arc::new(DoubleBuffer::new(
                CanonicalVisibleSet::empty(generation),
                CanonicalVisibleSet::empty(generation),
            )),
            config,
            candidates: Candidates {
                generation,
                segments: Arc::new(segments),
                voxels,
            },
            raster_fence: Fence::signaled(),
            upload_fence: Fence::signaled(),
            in_flight: None,
            dedup: None,
            dedup_stale: false,
            pending: None,
            back_ready: false,
            restart: true,
            stats,
        }
    }

    /// Advances the pipeline by one frame.
    ///
    /// `view_proj` is the camera of this frame; `framebuffer` is the main
    /// framebuffer size the oracle resolution is derived from.
    ///
    /// # Errors
    ///
    /// Returns device errors from resizing, rasterizing, issuing or mapping
    /// the readback, or uploading. Transient readback failures (see
    /// [`CullingError::is_transient`]) and worker failures are not errors:
    /// they are logged, counted and the previous result stays published.
    pub fn update(&mut self, view_proj: Mat4, framebuffer: Resolution) -> CullingResult<CycleOutcome> {
        self.stats.frames += 1;
        self.readback.progress();
        self.harvest_dedup();
        self.observe_worker();
        self.apply_resolution(framebuffer)?;
        self.publish()?;

        if !self.config.occlusion_enabled {
            if std::mem::take(&mut self.restart) {
                self.pending = Some(self.all_candidates());
                self.publish()?;
            }
            return Ok(CycleOutcome::Passthrough);
        }

        if !self.restart && !self.cycle_ready() {
            self.stats.frames_skipped += 1;
            tracing::trace!(frame = self.stats.frames, "culling cycle still in flight; frame skipped");
            return Ok(CycleOutcome::Skipped);
        }
        self.restart = false;

        if let Some(done) = self.in_flight.take() {
            self.finish_readback(done)?;
        }

        if self.candidates.voxels.is_empty() {
            if self.back_ready || !self.published.read().is_empty() {
                self.pending = Some(CanonicalVisibleSet::empty(self.candidates.generation));
                self.publish()?;
            }
            return Ok(CycleOutcome::NoCandidates);
        }

        let rasterized = self.oracle.rasterize(&RasterRequest {
            candidate_voxels: &self.candidates.voxels,
            view_proj,
        })?;
        let ticket = self.readback.begin(rasterized.output)?;
        self.raster_fence = rasterized.fence;
        self.in_flight = Some(InFlight {
            ticket,
            generation: self.candidates.generation,
        });
        self.stats.cycles_started += 1;
        tracing::debug!(
            cycle = self.stats.cycles_started,
            candidate_voxels = self.candidates.voxels.len(),
            resolution = %self.oracle.resolution(),
            "culling cycle started"
        );
        Ok(CycleOutcome::Started)
    }

    /// Replaces the candidate set. Work computed against the previous set
    /// is discarded and the next `update` starts a fresh cycle.
    ///
    /// The published set is left as is until that cycle publishes, so for a
    /// cycle or two it may still list segments that are no longer
    /// candidates. Those extra draws are harmless false positives.
    pub fn set_candidates(&mut self, generation: u64, segments: BitSet) {
        let voxels = self.index.candidate_voxels(&segments);
        self.stats.last_candidate_voxels = voxels.len();
        self.candidates = Candidates {
            generation,
            segments: Arc::new(segments),
            voxels,
        };
        self.invalidate("candidate set changed");
    }

    /// Turns occlusion on or off. Off publishes every candidate.
    pub fn set_occlusion_enabled(&mut self, enabled: bool) {
        if self.config.occlusion_enabled != enabled {
            self.config.occlusion_enabled = enabled;
            self.invalidate("occlusion toggled");
        }
    }

    /// The published visible set. Hold the guard for the whole draw call.
    #[must_use]
    pub fn visible(&self) -> FrontRead<'_, CanonicalVisibleSet> {
        self.published.read()
    }

    /// Shared handle to the published sets, for a draw pass on another thread.
    #[must_use]
    pub fn published(&self) -> Arc<DoubleBuffer<CanonicalVisibleSet>> {
        Arc::clone(&self.published)
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> CullingStats {
        self.stats
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    /// Generation of the current candidate set.
    #[must_use]
    pub fn candidate_generation(&self) -> u64 {
        self.candidates.generation
    }

    /// The oracle backend.
    #[must_use]
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// The oracle backend, mutably.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// The upload backend.
    #[must_use]
    pub fn uploader(&self) -> &U {
        &self.upload
    }

    /// Drops the in-flight readback, if any.
    pub fn discard_in_flight(&mut self) {
        if let Some(stale) = self.in_flight.take() {
            self.readback.discard(stale.ticket);
            self.stats.readbacks_discarded += 1;
        }
    }

    fn invalidate(&mut self, reason: &'static str) {
        if self.in_flight.is_some() {
            tracing::debug!(reason, "discarding in-flight readback");
        }
        self.discard_in_flight();
        // The running task cannot be cancelled; its result is dropped on harvest.
        self.dedup_stale = self.dedup.is_some();
        self.pending = None;
        self.back_ready = false;
        self.restart = true;
    }

    fn cycle_ready(&mut self) -> bool {
        if !self.raster_fence.is_signaled() || !self.upload_fence.is_signaled() || self.dedup.is_some() {
            return false;
        }
        match &self.in_flight {
            Some(in_flight) => self.readback.poll_ready(&in_flight.ticket),
            None => true,
        }
    }

    fn harvest_dedup(&mut self) {
        let Some(handle) = self.dedup.as_mut() else {
            return;
        };
        match handle.poll() {
            TaskState::Pending => {}
            TaskState::Ready => {
                let set = handle.try_take();
                self.dedup = None;
                let stale = std::mem::take(&mut self.dedup_stale);
                match set {
                    Some(set) if !stale && set.generation() == self.candidates.generation => {
                        self.pending = Some(set);
                    }
                    Some(set) => {
                        tracing::debug!(
                            generation = set.generation(),
                            current = self.candidates.generation,
                            "dropping visible set computed before the last restart"
                        );
                    }
                    None => {}
                }
            }
            TaskState::Failed => {
                self.dedup = None;
                self.dedup_stale = false;
                self.stats.failed_tasks += 1;
                tracing::warn!("dedup task failed; keeping the published visible set");
            }
        }
    }

    fn apply_resolution(&mut self, framebuffer: Resolution) -> CullingResult<()> {
        let target = self.config.oracle_resolution.resolve(framebuffer);
        let current = self.oracle.resolution();
        if target == current {
            return Ok(());
        }
        self.oracle.resize(target)?;
        if let Some(stale) = self.in_flight.take() {
            let err = CullingError::StaleReadback {
                expected: target,
                actual: stale.ticket.resolution(),
            };
            tracing::warn!(error = %err, "oracle resized mid-cycle; readback discarded");
            self.readback.discard(stale.ticket);
            self.stats.readbacks_discarded += 1;
        }
        self.restart = true;
        Ok(())
    }

    /// Tracks whether our dedup task is stuck behind other work on a shared
    /// worker. The render thread never waits on it; culling just stops
    /// advancing, which is reported once per stall.
    fn observe_worker(&mut self) {
        let backlog = self.worker.queued();
        self.stats.worker_backlog = backlog;
        if self.dedup.is_none() || backlog == 0 {
            self.stats.worker_stalled_frames = 0;
            return;
        }
        self.stats.worker_stalled_frames += 1;
        if self.stats.worker_stalled_frames == WORKER_STALL_WARN_FRAMES {
            tracing::warn!(
                backlog,
                frames = WORKER_STALL_WARN_FRAMES,
                "dedup task queued behind other work; visible set is not advancing"
            );
        }
    }

    fn finish_readback(&mut self, done: InFlight) -> CullingResult<()> {
        let expected = self.oracle.resolution();
        if done.ticket.resolution() != expected || done.generation != self.candidates.generation {
            self.readback.discard(done.ticket);
            self.stats.readbacks_discarded += 1;
            return Ok(());
        }

        match self.readback.map(&done.ticket) {
            Ok(raw) => {
                let index = Arc::clone(&self.index);
                let candidates = Arc::clone(&self.candidates.segments);
                let generation = done.generation;
                self.dedup = Some(
                    self.worker
                        .enqueue(move || build_visible_set(raw, &index, &candidates, generation)),
                );
            }
            Err(err) if err.is_transient() => {
                self.stats.readback_failures += 1;
                tracing::warn!(error = %err, "readback failed; this cycle produced nothing new");
                self.readback.discard(done.ticket);
            }
            Err(err) => {
                self.readback.discard(done.ticket);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Promotes a finished upload, stages the pending set, and promotes
    /// again if that upload finished synchronously.
    fn publish(&mut self) -> CullingResult<()> {
        self.promote();
        if self.back_ready || !self.upload_fence.is_signaled() {
            return Ok(());
        }
        let Some(set) = self.pending.take() else {
            return Ok(());
        };
        let Some(mut back) = self.published.try_write_back() else {
            // A draw still holds the slot from before the last swap.
            self.pending = Some(set);
            self.defer_handoff();
            return Ok(());
        };
        let slot = self.published.front_index() ^ 1;
        self.upload_fence = self.upload.upload(slot, set.as_slice())?;
        *back = set;
        drop(back);
        self.back_ready = true;
        self.promote();
        Ok(())
    }

    fn promote(&mut self) {
        if !self.back_ready || !self.upload_fence.is_signaled() {
            return;
        }
        if self.published.try_swap().is_none() {
            self.defer_handoff();
            return;
        }
        self.back_ready = false;
        self.stats.sets_published += 1;
        let front = self.published.read();
        self.stats.last_visible_voxels = front.visible_voxels();
        self.stats.last_visible_segments = front.len();
    }

    fn defer_handoff(&mut self) {
        self.stats.handoffs_deferred += 1;
        tracing::trace!(
            deferred = self.stats.handoffs_deferred,
            "back slot pinned by a reader; handoff retried next frame"
        );
    }

    #[allow(clippy::cast_possible_truncation)]
    fn all_candidates(&self) -> CanonicalVisibleSet {
        let segments = self.candidates.segments.iter_ones().map(|i| i as u32).collect();
        CanonicalVisibleSet::from_sorted(segments, self.candidates.voxels.len(), self.candidates.generation)
    }
}

impl<O, R, U> Drop for CullingPipeline<O, R, U>
where
    O: VisibilityOracle,
    R: AsyncReadback<Source = O::Output>,
    U: VisibleSetUpload,
{
    fn drop(&mut self) {
        self.discard_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::SoftwareOracle;
    use crate::readback::HostReadback;
    use crate::upload::HostUpload;
    use crate::voxel::{ProxyMesh, VoxelCoord};
    use glam::Vec3;
    use std::time::Duration;

    type HostPipeline = CullingPipeline<SoftwareOracle, HostReadback, HostUpload>;

    fn pipeline(config: CullingConfig, latency: u32) -> HostPipeline {
        let worker = Arc::new(TaskWorker::spawn("pipeline-test").unwrap());
        pipeline_on(worker, config, latency)
    }

    fn pipeline_on(worker: Arc<TaskWorker>, config: CullingConfig, latency: u32) -> HostPipeline {
        let mut index = VoxelIndex::empty(1.0, 4);
        index.insert(VoxelCoord::new(0, 0, 0), 0);
        index.insert(VoxelCoord::new(0, 0, 0), 1);
        index.insert(VoxelCoord::new(30, 0, 0), 2);
        let mut oracle = SoftwareOracle::new(Resolution::new(32, 32));
        oracle.load_proxies(Arc::new(ProxyMesh::build(&index))).unwrap();
        CullingPipeline::new(
            oracle,
            HostReadback::with_latency(latency),
            HostUpload::new(),
            worker,
            Arc::new(index),
            config,
            (0, BitSet::from_indices(4, [0, 1, 2])),
        )
    }

    fn camera() -> Mat4 {
        let target = Vec3::splat(0.5);
        Mat4::perspective_rh(20f32.to_radians(), 1.0, 0.1, 100.0)
            * Mat4::look_at_rh(target + Vec3::Z * 10.0, target, Vec3::Y)
    }

    fn run_until(p: &mut HostPipeline, fb: Resolution, done: impl Fn(&CanonicalVisibleSet) -> bool) -> bool {
        for _ in 0..500 {
            p.update(camera(), fb).unwrap();
            if done(&p.visible()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_first_update_starts_cycle() {
        let mut p = pipeline(CullingConfig::default(), 3);
        let fb = Resolution::new(32, 32);
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::Started);
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::Skipped);
        assert!(p.visible().is_empty());
        assert_eq!(p.stats().cycles_started, 1);
    }

    #[test]
    fn test_cycle_publishes_visible_voxel() {
        let mut p = pipeline(CullingConfig::default(), 1);
        let fb = Resolution::new(32, 32);
        assert!(run_until(&mut p, fb, |set| !set.is_empty()));
        assert_eq!(p.visible().as_slice(), &[0, 1]);
        assert_eq!(p.stats().last_visible_voxels, 1);
        // The device buffer of the front slot holds the same list.
        assert_eq!(p.uploader().slot(p.published().front_index()), &[0, 1]);
    }

    #[test]
    fn test_passthrough_publishes_all_candidates() {
        let config = CullingConfig {
            occlusion_enabled: false,
            ..CullingConfig::default()
        };
        let mut p = pipeline(config, 0);
        let fb = Resolution::new(32, 32);
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::Passthrough);
        assert_eq!(p.visible().as_slice(), &[0, 1, 2]);
        assert_eq!(p.stats().cycles_started, 0);
    }

    #[test]
    fn test_empty_candidates_publish_empty_set() {
        let mut p = pipeline(CullingConfig::default(), 0);
        let fb = Resolution::new(32, 32);
        assert!(run_until(&mut p, fb, |set| !set.is_empty()));

        p.set_candidates(1, BitSet::new(4));
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::NoCandidates);
        assert!(p.visible().is_empty());
        assert_eq!(p.visible().generation(), p.published().generation());
    }

    #[test]
    fn test_resize_discards_in_flight_readback() {
        let config = CullingConfig {
            oracle_resolution: crate::config::ResolutionPolicy::Scaled { factor: 0.5 },
            ..CullingConfig::default()
        };
        let mut p = pipeline(config, 10);
        assert_eq!(p.update(camera(), Resolution::new(64, 64)).unwrap(), CycleOutcome::Started);
        assert_eq!(p.oracle().resolution(), Resolution::new(32, 32));

        assert_eq!(p.update(camera(), Resolution::new(128, 128)).unwrap(), CycleOutcome::Started);
        assert_eq!(p.oracle().resolution(), Resolution::new(64, 64));
        assert_eq!(p.stats().readbacks_discarded, 1);
        assert_eq!(p.stats().cycles_started, 2);
    }

    #[test]
    fn test_pinned_reader_defers_handoff() {
        let mut p = pipeline(CullingConfig::default(), 0);
        let fb = Resolution::new(32, 32);
        let published = p.published();
        let pinned = published.read();
        assert!(run_until(&mut p, fb, |set| !set.is_empty()));

        // The next set needs the slot `pinned` still holds.
        let mut frames = 0;
        while p.stats().handoffs_deferred == 0 {
            p.update(camera(), fb).unwrap();
            frames += 1;
            assert!(frames < 500, "handoff never hit the pinned slot");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(p.stats().sets_published, 1);
        assert!(pinned.is_empty());
        assert_eq!(pinned.generation(), 0);
        assert_eq!(p.visible().as_slice(), &[0, 1]);
        drop(pinned);

        p.update(camera(), fb).unwrap();
        assert!(p.stats().sets_published >= 2);
        assert_eq!(p.visible().as_slice(), &[0, 1]);
    }

    #[test]
    fn test_busy_worker_reports_stall() {
        let worker = Arc::new(TaskWorker::spawn("busy-worker").unwrap());
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let blocker = worker.enqueue(move || {
            let _ = release_rx.recv();
        });
        let mut p = pipeline_on(Arc::clone(&worker), CullingConfig::default(), 0);
        let fb = Resolution::new(32, 32);

        for _ in 0..10 {
            p.update(camera(), fb).unwrap();
        }
        let stats = p.stats();
        assert!(stats.worker_backlog >= 1);
        assert!(stats.worker_stalled_frames > 0);
        assert!(p.visible().is_empty());

        release_tx.send(()).unwrap();
        assert_eq!(blocker.wait(), Some(()));
        assert!(run_until(&mut p, fb, |set| !set.is_empty()));
    }

    #[test]
    fn test_old_set_stays_published_until_next_cycle() {
        let mut p = pipeline(CullingConfig::default(), 10);
        let fb = Resolution::new(32, 32);
        assert!(run_until(&mut p, fb, |set| !set.is_empty()));
        let published = p.stats().sets_published;

        // Voxel 2 is out of view; segments 0 and 1 stop being candidates but
        // stay drawn until the new cycle lands.
        p.set_candidates(1, BitSet::from_indices(4, [2]));
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::Started);
        assert_eq!(p.visible().as_slice(), &[0, 1]);
        assert_eq!(p.stats().sets_published, published);

        assert!(run_until(&mut p, fb, CanonicalVisibleSet::is_empty));
        assert_eq!(p.visible().generation(), 1);
    }

    #[test]
    fn test_candidate_change_restarts_cycle() {
        let mut p = pipeline(CullingConfig::default(), 10);
        let fb = Resolution::new(32, 32);
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::Started);
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::Skipped);

        p.set_candidates(1, BitSet::from_indices(4, [2]));
        assert_eq!(p.update(camera(), fb).unwrap(), CycleOutcome::Started);
        assert_eq!(p.candidate_generation(), 1);
        assert_eq!(p.stats().readbacks_discarded, 1);
    }
}
