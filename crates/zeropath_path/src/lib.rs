//! # ZEROPATH Path Model
//!
//! The read-only input of the culling pipeline: an ordered sequence of
//! [`PathPoint`]s, where each consecutive pair may form a drawable segment.
//!
//! ## Segments
//!
//! Segment `i` joins point `i` and point `i + 1`. Whether it exists is
//! decided once per load by a [`ValidityRule`] and recorded in a
//! [`SegmentTable`]; invalid indices are never candidates.
//!
//! ## Example
//!
//! ```rust
//! use glam::Vec3;
//! use zeropath_path::{ExtrusionRole, PathPoint, SegmentTable, ValidityRule};
//!
//! let points = [
//!     PathPoint::extrude(Vec3::ZERO, ExtrusionRole::Perimeter, 0.4, 0.2),
//!     PathPoint::extrude(Vec3::X, ExtrusionRole::Perimeter, 0.4, 0.2),
//! ];
//! let table = SegmentTable::build(&points, ValidityRule::Strict);
//! assert!(table.is_valid(0));
//! assert!(!table.is_valid(1));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod filter;
pub mod flags;
pub mod point;
pub mod segment;
pub mod synthetic;

pub use filter::CandidateFilter;
pub use flags::{ExtrusionRole, MoveFlags, MoveType};
pub use point::{PathBounds, PathPoint};
pub use segment::{SegmentTable, ValidityRule};
pub use synthetic::{layered_rings, random_walk, LayeredRingsConfig, RandomWalkConfig};
