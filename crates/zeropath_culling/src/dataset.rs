//! # Renderable Dataset
//!
//! Everything derived from one loaded point sequence, with an explicit
//! lifecycle:
//!
//! ```text
//!  load(points) ─> SegmentTable ─> VoxelIndex ─> ProxyMesh ─> oracle.load_proxies
//!                                       │
//!                   CandidateFilter ────┴──> CullingPipeline
//!
//!  unload() ─> discard in-flight readback ─> oracle.unload_proxies
//! ```
//!
//! A reload is `unload` followed by a fresh `load`; nothing is patched in
//! place.

use std::sync::Arc;

use glam::Mat4;
use zeropath_core::{FrontRead, TaskWorker};
use zeropath_path::{CandidateFilter, PathBounds, PathPoint, SegmentTable};

use crate::config::CullingConfig;
use crate::error::CullingResult;
use crate::oracle::{Resolution, VisibilityOracle};
use crate::pipeline::{CullingPipeline, CullingStats, CycleOutcome};
use crate::readback::AsyncReadback;
use crate::upload::VisibleSetUpload;
use crate::visible_set::CanonicalVisibleSet;
use crate::voxel::{ProxyMesh, VoxelIndex};

/// A loaded point sequence and its culling pipeline.
pub struct RenderableDataset<O, R, U>
where
    O: VisibilityOracle,
    R: AsyncReadback<Source = O::Output>,
    U: VisibleSetUpload,
{
    points: Vec<PathPoint>,
    table: SegmentTable,
    index: Arc<VoxelIndex>,
    mesh: Arc<ProxyMesh>,
    filter: CandidateFilter,
    bounds: Option<PathBounds>,
    pipeline: CullingPipeline<O, R, U>,
}

impl<O, R, U> RenderableDataset<O, R, U>
where
    O: VisibilityOracle,
    R: AsyncReadback<Source = O::Output>,
    U: VisibleSetUpload,
{
    /// Builds the index and proxies for `points` and hands the proxies to
    /// `oracle`. Every segment starts out eligible.
    ///
    /// # Errors
    ///
    /// Returns [`CullingError::InvalidConfig`](crate::CullingError::InvalidConfig)
    /// for a bad config, or the oracle's error if the proxies cannot be loaded.
    pub fn load(
        points: Vec<PathPoint>,
        config: &CullingConfig,
        mut oracle: O,
        readback: R,
        upload: U,
        worker: Arc<TaskWorker>,
    ) -> CullingResult<Self> {
        config.validate()?;

        let table = SegmentTable::build(&points, config.validity);
        let index = Arc::new(VoxelIndex::build(&points, &table, config.voxel_size));
        let mesh = Arc::new(ProxyMesh::build(&index));
        oracle.load_proxies(Arc::clone(&mesh))?;

        let filter = CandidateFilter::new(table.len());
        let candidates = filter.candidates(&points, &table);
        let bounds = PathBounds::from_points(&points);

        tracing::info!(
            points = points.len(),
            segments = table.valid_count(),
            voxels = index.voxel_count() - 1,
            proxy_triangles = mesh.indices().len() / 3,
            "dataset loaded"
        );

        let pipeline = CullingPipeline::new(
            oracle,
            readback,
            upload,
            worker,
            Arc::clone(&index),
            config.clone(),
            (filter.generation(), candidates),
        );

        Ok(Self {
            points,
            table,
            index,
            mesh,
            filter,
            bounds,
            pipeline,
        })
    }

    /// Advances the culling pipeline by one frame.
    ///
    /// # Errors
    ///
    /// See [`CullingPipeline::update`].
    pub fn update(&mut self, view_proj: Mat4, framebuffer: Resolution) -> CullingResult<CycleOutcome> {
        self.pipeline.update(view_proj, framebuffer)
    }

    /// Mutates the role/type/window selection. If the candidate set changed,
    /// it is rebuilt and the pipeline restarts its cycle.
    pub fn update_filter(&mut self, f: impl FnOnce(&mut CandidateFilter)) {
        let before = self.filter.generation();
        f(&mut self.filter);
        if self.filter.generation() != before {
            let candidates = self.filter.candidates(&self.points, &self.table);
            self.pipeline.set_candidates(self.filter.generation(), candidates);
        }
    }

    /// Turns occlusion on or off.
    pub fn set_occlusion_enabled(&mut self, enabled: bool) {
        self.pipeline.set_occlusion_enabled(enabled);
    }

    /// The published visible set.
    #[must_use]
    pub fn visible(&self) -> FrontRead<'_, CanonicalVisibleSet> {
        self.pipeline.visible()
    }

    /// Pipeline counters.
    #[must_use]
    pub fn stats(&self) -> CullingStats {
        self.pipeline.stats()
    }

    /// The point sequence.
    #[must_use]
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    /// Segment validity.
    #[must_use]
    pub fn table(&self) -> &SegmentTable {
        &self.table
    }

    /// The voxel index.
    #[must_use]
    pub fn index(&self) -> &VoxelIndex {
        &self.index
    }

    /// Proxy geometry handed to the oracle.
    #[must_use]
    pub fn mesh(&self) -> &ProxyMesh {
        &self.mesh
    }

    /// Current role/type/window selection.
    #[must_use]
    pub fn filter(&self) -> &CandidateFilter {
        &self.filter
    }

    /// Bounds of all points, `None` for an empty sequence.
    #[must_use]
    pub fn bounds(&self) -> Option<PathBounds> {
        self.bounds
    }

    /// The pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &CullingPipeline<O, R, U> {
        &self.pipeline
    }

    /// Releases device resources. The dataset is gone afterwards.
    pub fn unload(mut self) {
        self.pipeline.discard_in_flight();
        self.pipeline.oracle_mut().unload_proxies();
        tracing::info!(points = self.points.len(), "dataset unloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::SoftwareOracle;
    use crate::readback::HostReadback;
    use crate::upload::HostUpload;
    use zeropath_path::{random_walk, ExtrusionRole, RandomWalkConfig};

    fn load(points: Vec<PathPoint>) -> RenderableDataset<SoftwareOracle, HostReadback, HostUpload> {
        RenderableDataset::load(
            points,
            &CullingConfig::default(),
            SoftwareOracle::new(Resolution::new(16, 16)),
            HostReadback::new(),
            HostUpload::new(),
            Arc::new(TaskWorker::spawn("dataset-test").unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_load_builds_everything() {
        let points = random_walk(&RandomWalkConfig::default(), 3);
        let dataset = load(points);
        assert_eq!(dataset.table().len(), dataset.points().len());
        assert_eq!(dataset.mesh().box_count(), dataset.index().voxel_count());
        assert!(dataset.bounds().is_some());
        assert_eq!(dataset.pipeline().candidate_generation(), 0);
        dataset.unload();
    }

    #[test]
    fn test_filter_change_reaches_pipeline() {
        let mut dataset = load(random_walk(&RandomWalkConfig::default(), 4));
        dataset.update_filter(|f| f.update_range(|r| r.set_current_max(5)));
        assert_eq!(dataset.pipeline().candidate_generation(), 1);

        // No effective change: generation stays.
        dataset.update_filter(|f| f.set_role_enabled(ExtrusionRole::Perimeter, true));
        assert_eq!(dataset.pipeline().candidate_generation(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CullingConfig {
            voxel_size: 0.0,
            ..CullingConfig::default()
        };
        let result = RenderableDataset::load(
            Vec::new(),
            &config,
            SoftwareOracle::new(Resolution::new(4, 4)),
            HostReadback::new(),
            HostUpload::new(),
            Arc::new(TaskWorker::spawn("dataset-test").unwrap()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_dataset_publishes_nothing() {
        let mut dataset = load(Vec::new());
        assert!(dataset.bounds().is_none());
        let outcome = dataset.update(Mat4::IDENTITY, Resolution::new(16, 16)).unwrap();
        assert_eq!(outcome, CycleOutcome::NoCandidates);
        assert!(dataset.visible().is_empty());
    }
}
