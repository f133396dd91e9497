use std::collections::VecDeque;

use bytes::Bytes;

/// FIFO of encoded, not-yet-written envelopes.
///
/// Entries carry a sequence number so the driver can pop exactly the frame it
/// wrote even if the queue was cleared (by `close`) while the write was in
/// flight.
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    frames: VecDeque<(u64, Bytes)>,
    next_seq: u64,
}

impl OutboundQueue {
    pub(crate) fn push(&mut self, frame: Bytes) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frames.push_back((seq, frame));
    }

    pub(crate) fn front(&self) -> Option<(u64, Bytes)> {
        self.frames.front().map(|(seq, f)| (*seq, f.clone()))
    }

    /// Remove the head if it is still `seq`.
    pub(crate) fn pop_if(&mut self, seq: u64) {
        if self.frames.front().map(|(s, _)| *s) == Some(seq) {
            self.frames.pop_front();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }
}
