//! Host-memory readback for the software oracle.
//!
//! The "transfer" is a move of the already host-resident image. A
//! configurable latency (in polls) stands in for device round trips so the
//! pipeline's skip/retry paths get exercised without a GPU.

use std::collections::HashMap;

use super::{AsyncReadback, RawVisibleIds, ReadbackTicket};
use crate::error::{CullingError, CullingResult};
use crate::oracle::IdImage;

#[derive(Debug)]
struct Transfer {
    ids: Vec<u32>,
    polls_left: u32,
}

/// Readback of [`IdImage`]s with simulated latency.
#[derive(Debug, Default)]
pub struct HostReadback {
    latency: u32,
    next_id: u64,
    in_flight: HashMap<u64, Transfer>,
}

impl HostReadback {
    /// Transfers complete on the first poll.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers report ready only after `polls` unsuccessful polls.
    #[must_use]
    pub fn with_latency(polls: u32) -> Self {
        Self {
            latency: polls,
            ..Self::default()
        }
    }

    /// Number of transfers not yet mapped or discarded.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl AsyncReadback for HostReadback {
    type Source = IdImage;

    fn begin(&mut self, source: IdImage) -> CullingResult<ReadbackTicket> {
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.insert(
            id,
            Transfer {
                ids: source.ids,
                polls_left: self.latency,
            },
        );
        Ok(ReadbackTicket::new(id, source.resolution))
    }

    fn poll_ready(&mut self, ticket: &ReadbackTicket) -> bool {
        match self.in_flight.get_mut(&ticket.id()) {
            Some(transfer) if transfer.polls_left == 0 => true,
            Some(transfer) => {
                transfer.polls_left -= 1;
                false
            }
            None => false,
        }
    }

    fn map(&mut self, ticket: &ReadbackTicket) -> CullingResult<RawVisibleIds> {
        match self.in_flight.get(&ticket.id()) {
            None => Err(CullingError::UnknownTicket(ticket.id())),
            Some(transfer) if transfer.polls_left > 0 => Err(CullingError::WouldBlock),
            Some(_) => self
                .in_flight
                .remove(&ticket.id())
                .map(|transfer| RawVisibleIds(transfer.ids))
                .ok_or(CullingError::UnknownTicket(ticket.id())),
        }
    }

    fn discard(&mut self, ticket: ReadbackTicket) {
        self.in_flight.remove(&ticket.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Resolution;

    fn image(ids: &[u32]) -> IdImage {
        IdImage {
            resolution: Resolution::new(ids.len() as u32, 1),
            ids: ids.to_vec(),
        }
    }

    #[test]
    fn test_immediate_transfer() {
        let mut readback = HostReadback::new();
        let ticket = readback.begin(image(&[0, 3, 3])).unwrap();
        assert_eq!(ticket.resolution(), Resolution::new(3, 1));
        assert!(readback.poll_ready(&ticket));
        assert_eq!(readback.map(&ticket).unwrap(), RawVisibleIds(vec![0, 3, 3]));
        assert_eq!(readback.in_flight(), 0);
    }

    #[test]
    fn test_latency_and_premature_map() {
        let mut readback = HostReadback::with_latency(2);
        let ticket = readback.begin(image(&[7])).unwrap();

        assert!(matches!(readback.map(&ticket), Err(CullingError::WouldBlock)));
        assert!(!readback.poll_ready(&ticket));
        assert!(!readback.poll_ready(&ticket));
        assert!(readback.poll_ready(&ticket));
        assert_eq!(readback.map(&ticket).unwrap().into_vec(), vec![7]);
    }

    #[test]
    fn test_released_ticket_is_unknown() {
        let mut readback = HostReadback::new();
        let first = readback.begin(image(&[1])).unwrap();
        let second = readback.begin(image(&[2])).unwrap();
        assert_ne!(first.id(), second.id());

        readback.map(&first).unwrap();
        assert!(matches!(readback.map(&first), Err(CullingError::UnknownTicket(_))));

        readback.discard(second);
        assert_eq!(readback.in_flight(), 0);
    }
}
