//! # ZEROPATH Core
//!
//! Engine-agnostic building blocks for the visibility-streaming pipeline:
//! - Bit sets over segment indices, with an atomic variant for parallel marking
//! - A clamped sequential window over the ordered segment sequence
//! - Double-buffered handoff between the culling cycle and the draw pass
//! - A single long-lived worker for off-frame canonicalization
//!
//! ## Architecture Rules
//!
//! 1. **The render thread never blocks** - every wait is a non-blocking poll
//! 2. **One writer per buffer** - handoff happens by swap, never by copy
//! 3. **Atomics only where shared** - the plain bit set stays plain
//!
//! ## Example
//!
//! ```rust
//! use zeropath_core::{AtomicBitSet, SetBits};
//!
//! let marks = AtomicBitSet::new(256);
//! assert!(marks.set_atomic(42));
//! assert!(!marks.set_atomic(42));
//! assert_eq!(marks.iter_ones().collect::<Vec<_>>(), vec![42]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bitset;
pub mod range;
pub mod sync;
pub mod worker;

pub use bitset::{AtomicBitSet, BitSet, SetBitIter, SetBits, BLOCK_BITS};
pub use range::SequentialRange;
pub use sync::{DoubleBuffer, Fence, FenceSignal, FrontRead};
pub use worker::{TaskHandle, TaskState, TaskWorker, WorkerStats};
