//! # Software Oracle
//!
//! CPU rasterizer with a depth buffer. Reference backend for tests and the
//! headless soak run; matches the device path's conventions:
//! - clip space depth in `0..=1` (`glam::Mat4::perspective_rh` and friends)
//! - pixel centers at `+0.5`, row 0 at the top
//! - no face culling, nearest depth wins
//!
//! Triangles are clipped against the near plane (`z >= 0`) before the
//! perspective divide, so boxes straddling the camera never wrap around.

use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use zeropath_core::Fence;

use super::{IdImage, RasterRequest, Rasterized, Resolution, VisibilityOracle};
use crate::error::{CullingError, CullingResult};
use crate::voxel::ProxyMesh;

/// Statistics of the last rasterization.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterStats {
    /// Boxes submitted.
    pub boxes: usize,
    /// Triangles that survived near-plane clipping.
    pub triangles: usize,
    /// Pixels that passed the depth test.
    pub pixels_written: usize,
}

/// CPU visibility oracle.
pub struct SoftwareOracle {
    resolution: Resolution,
    mesh: Option<Arc<ProxyMesh>>,
    depth: Vec<f32>,
    stats: RasterStats,
}

impl SoftwareOracle {
    /// Creates an oracle rendering at `resolution`.
    #[must_use]
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            mesh: None,
            depth: vec![f32::INFINITY; resolution.pixel_count()],
            stats: RasterStats::default(),
        }
    }

    /// Statistics of the last rasterization.
    #[must_use]
    pub const fn stats(&self) -> RasterStats {
        self.stats
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_screen(&self, clip: Vec4) -> Vec3 {
        let ndc = clip.xyz() / clip.w;
        Vec3::new(
            (ndc.x * 0.5 + 0.5) * self.resolution.width as f32,
            (0.5 - ndc.y * 0.5) * self.resolution.height as f32,
            ndc.z,
        )
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::many_single_char_names
    )]
    fn fill_triangle(&mut self, ids: &mut [u32], tri: [Vec3; 3], id: u32) {
        let [a, b, c] = tri;
        let edge = |p: Vec2, q: Vec2, r: Vec2| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
        let area = edge(a.truncate(), b.truncate(), c.truncate());
        if area.abs() <= f32::EPSILON {
            return;
        }

        let width = self.resolution.width as f32;
        let height = self.resolution.height as f32;
        let min_x = a.x.min(b.x).min(c.x).floor().max(0.0);
        let max_x = a.x.max(b.x).max(c.x).ceil().min(width);
        let min_y = a.y.min(b.y).min(c.y).floor().max(0.0);
        let max_y = a.y.max(b.y).max(c.y).ceil().min(height);
        if min_x >= max_x || min_y >= max_y {
            return;
        }

        let stride = self.resolution.width as usize;
        for py in min_y as usize..max_y as usize {
            for px in min_x as usize..max_x as usize {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(b.truncate(), c.truncate(), p) / area;
                let w1 = edge(c.truncate(), a.truncate(), p) / area;
                let w2 = edge(a.truncate(), b.truncate(), p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let z = w0 * a.z + w1 * b.z + w2 * c.z;
                if !(0.0..=1.0).contains(&z) {
                    continue;
                }
                let slot = py * stride + px;
                if z < self.depth[slot] {
                    self.depth[slot] = z;
                    ids[slot] = id;
                    self.stats.pixels_written += 1;
                }
            }
        }
    }
}

/// Sutherland-Hodgman against the `z >= 0` clip plane.
fn clip_near(tri: [Vec4; 3]) -> Vec<Vec4> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let cur = tri[i];
        let next = tri[(i + 1) % 3];
        let cur_in = cur.z >= 0.0;
        let next_in = next.z >= 0.0;
        if cur_in {
            out.push(cur);
        }
        if cur_in != next_in {
            let t = cur.z / (cur.z - next.z);
            out.push(cur + (next - cur) * t);
        }
    }
    out
}

impl VisibilityOracle for SoftwareOracle {
    type Output = IdImage;

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn resize(&mut self, resolution: Resolution) -> CullingResult<()> {
        self.resolution = resolution;
        self.depth = vec![f32::INFINITY; resolution.pixel_count()];
        Ok(())
    }

    fn load_proxies(&mut self, mesh: Arc<ProxyMesh>) -> CullingResult<()> {
        self.mesh = Some(mesh);
        Ok(())
    }

    fn unload_proxies(&mut self) {
        self.mesh = None;
    }

    fn rasterize(&mut self, request: &RasterRequest<'_>) -> CullingResult<Rasterized<IdImage>> {
        let Some(mesh) = self.mesh.clone() else {
            return Err(CullingError::Device("no proxy geometry loaded".into()));
        };
        let mut image = IdImage::cleared(self.resolution);
        self.depth.fill(f32::INFINITY);
        self.stats = RasterStats::default();

        for &voxel in request.candidate_voxels {
            let Some(triangles) = mesh.box_triangles(voxel) else {
                continue;
            };
            self.stats.boxes += 1;
            for tri in triangles {
                let clip = tri.map(|v| request.view_proj * Vec3::from(v.position).extend(1.0));
                let polygon = clip_near(clip);
                if polygon.len() < 3 {
                    continue;
                }
                let screen: Vec<Vec3> = polygon.iter().map(|&v| self.to_screen(v)).collect();
                for k in 1..screen.len() - 1 {
                    self.stats.triangles += 1;
                    self.fill_triangle(&mut image.ids, [screen[0], screen[k], screen[k + 1]], voxel);
                }
            }
        }

        Ok(Rasterized {
            output: image,
            fence: Fence::signaled(),
        })
    }
}
