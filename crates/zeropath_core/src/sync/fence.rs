//! Host-visible completion flags for device work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Polled completion flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct Fence {
    state: Arc<AtomicBool>,
}

/// The signalling half of a pending [`Fence`].
#[derive(Debug)]
pub struct FenceSignal {
    state: Arc<AtomicBool>,
}

impl Fence {
    /// A fence that is already signaled.
    #[must_use]
    pub fn signaled() -> Self {
        Self {
            state: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A pending fence plus the handle that signals it.
    #[must_use]
    pub fn pending() -> (Self, FenceSignal) {
        let state = Arc::new(AtomicBool::new(false));
        (
            Self {
                state: Arc::clone(&state),
            },
            FenceSignal { state },
        )
    }

    /// Non-blocking completion check.
    #[inline]
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::signaled()
    }
}

impl FenceSignal {
    /// Marks the fence complete.
    pub fn signal(self) {
        self.state.store(true, Ordering::Release);
    }
}
