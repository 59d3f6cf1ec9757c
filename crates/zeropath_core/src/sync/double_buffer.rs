//! # Double-Buffered Handoff
//!
//! Two slots behind `parking_lot::RwLock`s and an atomic front index.
//!
//! ```text
//!          ┌──────────────────────────────┐
//!          │        DoubleBuffer<T>       │
//!          │  ┌────────┐    ┌────────┐    │
//!          │  │ slot 0 │    │ slot 1 │    │
//!          │  └───┬────┘    └───┬────┘    │
//!          │  ┌───┴─────────────┴───┐     │
//!          │  │ front index (0 / 1) │     │
//!          │  └─────────────────────┘     │
//!          └──────────────────────────────┘
//!               │                 │
//!         read() (draw)    try_write_back() (cycle)
//! ```
//!
//! A [`FrontRead`] pins its slot for as long as it lives: a swap while a
//! reader holds the guard flips the index but cannot mutate what the reader
//! sees, so counts and contents are always read from the same publication.
//!
//! The writer side never waits on readers. [`DoubleBuffer::try_write_back`]
//! and [`DoubleBuffer::try_swap`] give up if the slot is pinned, and the
//! writer keeps its value for the next frame.

use parking_lot::{MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

struct Slot<T> {
    value: T,
    /// Generation at which this slot was last published.
    generation: u64,
}

/// Front/back pair with swap-based publication.
pub struct DoubleBuffer<T> {
    slots: [RwLock<Slot<T>>; 2],
    front: AtomicUsize,
    generation: AtomicU64,
}

impl<T: Default> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default())
    }
}

impl<T> DoubleBuffer<T> {
    /// Creates a buffer pair. `front` is visible immediately at generation 0.
    #[must_use]
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [
                RwLock::new(Slot {
                    value: front,
                    generation: 0,
                }),
                RwLock::new(Slot {
                    value: back,
                    generation: 0,
                }),
            ],
            front: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Index of the slot currently published (for debugging).
    #[inline]
    #[must_use]
    pub fn front_index(&self) -> usize {
        self.front.load(Ordering::Acquire)
    }

    /// Number of swaps performed so far.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Shared access to the published slot.
    #[must_use]
    pub fn read(&self) -> FrontRead<'_, T> {
        loop {
            let index = self.front.load(Ordering::Acquire);
            let guard = self.slots[index].read();
            // A swap between the load and the lock means we pinned the back slot.
            if self.front.load(Ordering::Acquire) == index {
                return FrontRead { guard };
            }
        }
    }

    /// Exclusive access to the unpublished slot, or `None` while a reader
    /// still pins it from before the last swap.
    ///
    /// Never blocks. Only one thread should drive the back slot.
    #[must_use]
    pub fn try_write_back(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        let index = self.front.load(Ordering::Acquire) ^ 1;
        let guard = self.slots[index].try_write()?;
        Some(RwLockWriteGuard::map(guard, |slot| &mut slot.value))
    }

    /// Publishes the back slot. Returns the new generation, or `None` if a
    /// reader briefly holds the back slot; the caller retries later.
    #[must_use]
    pub fn try_swap(&self) -> Option<u64> {
        let back = self.front.load(Ordering::Acquire) ^ 1;
        let mut slot = self.slots[back].try_write()?;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        slot.generation = generation;
        self.front.store(back, Ordering::Release);
        Some(generation)
    }
}

/// Read guard on the published slot.
pub struct FrontRead<'a, T> {
    guard: RwLockReadGuard<'a, Slot<T>>,
}

impl<T> FrontRead<'_, T> {
    /// Generation at which this slot was published.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.guard.generation
    }
}

impl<T> Deref for FrontRead<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard.value
    }
}
