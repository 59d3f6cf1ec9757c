//! Visible-set upload into the draw pass's index buffers.
//!
//! The draw pass owns two buffers matching the two [`DoubleBuffer`] slots.
//! A set is uploaded into the back slot's buffer and only published once
//! the returned fence signals.
//!
//! [`DoubleBuffer`]: zeropath_core::DoubleBuffer

use zeropath_core::Fence;

use crate::error::CullingResult;

/// Writes a canonical segment list into one of two device buffers.
pub trait VisibleSetUpload {
    /// Starts the upload of `segments` into buffer `slot` (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns a device error if the buffer cannot be (re)allocated.
    fn upload(&mut self, slot: usize, segments: &[u32]) -> CullingResult<Fence>;
}

/// Host-side stand-in that records what was uploaded.
#[derive(Debug, Default)]
pub struct HostUpload {
    slots: [Vec<u32>; 2],
    uploads: u64,
}

impl HostUpload {
    /// Creates an empty pair of buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of buffer `slot`.
    #[must_use]
    pub fn slot(&self, slot: usize) -> &[u32] {
        &self.slots[slot & 1]
    }

    /// Total uploads performed.
    #[must_use]
    pub fn uploads(&self) -> u64 {
        self.uploads
    }
}

impl VisibleSetUpload for HostUpload {
    fn upload(&mut self, slot: usize, segments: &[u32]) -> CullingResult<Fence> {
        let buffer = &mut self.slots[slot & 1];
        buffer.clear();
        buffer.extend_from_slice(segments);
        self.uploads += 1;
        Ok(Fence::signaled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_replaces_slot() {
        let mut upload = HostUpload::new();
        upload.upload(1, &[1, 2, 3]).unwrap();
        let fence = upload.upload(1, &[9]).unwrap();
        assert!(fence.is_signaled());
        assert_eq!(upload.slot(1), &[9]);
        assert!(upload.slot(0).is_empty());
        assert_eq!(upload.uploads(), 2);
    }
}
