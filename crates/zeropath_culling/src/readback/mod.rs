//! # Async Readback
//!
//! Streams an oracle output from the device into host memory without ever
//! blocking the render thread.
//!
//! ```text
//!   begin(output) ──> ticket ──> poll_ready(ticket)? ──> map(ticket) ──> RawVisibleIds
//!                                      │ false
//!                                      └──> try again next frame
//! ```
//!
//! `map` is only valid once `poll_ready` returned `true`; calling it earlier
//! reports [`CullingError::WouldBlock`](crate::CullingError::WouldBlock)
//! instead of waiting. A transfer is released by a successful `map` or by
//! `discard`.

mod host;

use crate::error::CullingResult;
use crate::oracle::Resolution;

pub use host::HostReadback;

/// Voxel ids as read back from the oracle: one per sample, unordered and
/// duplicate-heavy. Owned by exactly one party at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVisibleIds(pub Vec<u32>);

impl RawVisibleIds {
    /// Number of samples.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no sample was read back.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Takes the buffer.
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<u32> {
        self.0
    }
}

/// Handle of one in-flight transfer.
///
/// Deliberately not `Clone`: the holder owns the transfer.
#[derive(Debug, PartialEq, Eq)]
pub struct ReadbackTicket {
    id: u64,
    resolution: Resolution,
}

impl ReadbackTicket {
    /// Creates a ticket. Backends number their transfers.
    #[must_use]
    pub const fn new(id: u64, resolution: Resolution) -> Self {
        Self { id, resolution }
    }

    /// Backend-assigned transfer number.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Resolution of the oracle output being transferred.
    #[inline]
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Non-blocking device-to-host transfer of oracle outputs.
pub trait AsyncReadback {
    /// Oracle output this backend reads.
    type Source;

    /// Drives pending transfers. Called once per frame before any poll.
    fn progress(&mut self) {}

    /// Issues the transfer and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns a device error if the transfer cannot be recorded.
    fn begin(&mut self, source: Self::Source) -> CullingResult<ReadbackTicket>;

    /// Whether the transfer behind `ticket` completed. Never blocks.
    fn poll_ready(&mut self, ticket: &ReadbackTicket) -> bool;

    /// Copies the completed transfer out and releases it. A premature call
    /// leaves the transfer in flight.
    ///
    /// # Errors
    ///
    /// - `WouldBlock` if the transfer is not complete yet
    /// - `ReadbackFailed` if the device reported a failure
    /// - `UnknownTicket` if the transfer was already released
    fn map(&mut self, ticket: &ReadbackTicket) -> CullingResult<RawVisibleIds>;

    /// Drops a transfer without reading it.
    fn discard(&mut self, ticket: ReadbackTicket);
}
