//! Candidate buffering for out-of-order signaling
//!
//! ICE candidates routinely arrive before the session description they
//! belong to. They wait here and are applied, in arrival order, the moment
//! the remote description lands.

use crate::protocol::IceCandidate;
use std::collections::VecDeque;

/// FIFO buffer of candidates received before the remote description.
/// Non-empty only while the owning link has no remote description yet.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    items: VecDeque<IceCandidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: IceCandidate) {
        self.items.push_back(candidate);
    }

    /// Empties the queue, yielding candidates in the order they arrived.
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.items.drain(..).collect()
    }

    /// Discards everything, used when the link closes.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
