//! # Handoff Primitives
//!
//! The culling cycle and the draw pass never share a buffer mid-frame:
//!
//! ```text
//! Cycle N:
//!   Draw pass reads FRONT (result of cycle N-1)
//!   Cycle writes BACK      (result of cycle N)
//!
//! Cycle N+1:
//!   SWAP (atomic index flip)
//!   Draw pass reads the new FRONT
//! ```
//!
//! Fences mark device-side work ("rasterization done", "upload done") and are
//! only ever polled, never waited on.

mod double_buffer;
mod fence;

pub use double_buffer::{DoubleBuffer, FrontRead};
pub use fence::{Fence, FenceSignal};
