//! Path points and scene bounds.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::flags::{ExtrusionRole, MoveFlags, MoveType};

/// Height and width given to travel moves, which carry no extrusion.
pub const TRAVEL_THICKNESS: f32 = 0.1;

/// One point of an extrusion path.
///
/// Layout is `#[repr(C)]` with 4-byte fields only, so a slice of points can
/// be uploaded as-is.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PathPoint {
    /// Position in scene units.
    pub position: Vec3,
    /// Packed role and move type of the move ending here.
    pub flags: MoveFlags,
    /// Layer height.
    pub height: f32,
    /// Extrusion width.
    pub width: f32,
    /// Feed rate.
    pub speed: f32,
    /// Fan speed, percent.
    pub fan_speed: f32,
    /// Nozzle temperature.
    pub temperature: f32,
    /// Volumetric flow.
    pub volumetric_rate: f32,
    /// Active extruder.
    pub extruder_id: u32,
    /// Color slot.
    pub color_id: u32,
}

impl PathPoint {
    /// Creates a point with the given flags and zeroed attributes.
    #[must_use]
    pub fn new(position: Vec3, flags: MoveFlags) -> Self {
        Self {
            position,
            flags,
            ..Self::zeroed()
        }
    }

    /// An extruding move ending at `position`.
    #[must_use]
    pub fn extrude(position: Vec3, role: ExtrusionRole, width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::new(position, MoveFlags::new(role, MoveType::Extrude))
        }
    }

    /// A travel move ending at `position`.
    #[must_use]
    pub fn travel(position: Vec3) -> Self {
        Self {
            width: TRAVEL_THICKNESS,
            height: TRAVEL_THICKNESS,
            ..Self::new(position, MoveFlags::new(ExtrusionRole::None, MoveType::Travel))
        }
    }

    /// A move of an arbitrary type ending at `position`.
    #[must_use]
    pub fn with_type(position: Vec3, move_type: MoveType) -> Self {
        Self::new(position, MoveFlags::new(ExtrusionRole::None, move_type))
    }

    /// `true` for travel moves.
    #[inline]
    #[must_use]
    pub const fn is_travel_move(&self) -> bool {
        self.flags.is_travel()
    }

    /// `true` for extruding moves.
    #[inline]
    #[must_use]
    pub const fn is_extrude_move(&self) -> bool {
        self.flags.is_extrude()
    }
}

/// Axis-aligned bounds of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathBounds {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl PathBounds {
    /// Bounds of `points`, or `None` if empty.
    #[must_use]
    pub fn from_points(points: &[PathPoint]) -> Option<Self> {
        let first = points.first()?.position;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(p.position), max.max(p.position)));
        Some(Self { min, max })
    }

    /// Center of the box.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths of the box.
    #[inline]
    #[must_use]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the bounding sphere around [`PathBounds::center`].
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.extent().length() * 0.5
    }
}
