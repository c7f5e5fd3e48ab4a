/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sequence number bookkeeping.
//!
//! Sessions are owned by exactly one unit at a time, so this is plain data
//! rather than atomics.

use fixgate_core::types::SeqNum;
use serde::{Deserialize, Serialize};

/// Next outbound and next expected inbound sequence numbers of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumbers {
    next_sender_seq: u64,
    next_target_seq: u64,
}

impl SequenceNumbers {
    /// Creates sequence numbers starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_sender_seq: 1,
            next_target_seq: 1,
        }
    }

    /// Creates sequence numbers that continue after the given last values.
    ///
    /// # Arguments
    /// * `last_sent` - Last sequence number sent
    /// * `last_received` - Last sequence number received
    #[must_use]
    pub const fn continuing(last_sent: SeqNum, last_received: SeqNum) -> Self {
        Self {
            next_sender_seq: last_sent.value() + 1,
            next_target_seq: last_received.value() + 1,
        }
    }

    /// Returns the next sender sequence number without incrementing.
    #[inline]
    #[must_use]
    pub const fn next_sender_seq(&self) -> SeqNum {
        SeqNum::new(self.next_sender_seq)
    }

    /// Returns the next expected target sequence number.
    #[inline]
    #[must_use]
    pub const fn next_target_seq(&self) -> SeqNum {
        SeqNum::new(self.next_target_seq)
    }

    /// Returns the last sequence number sent, zero if none.
    #[inline]
    #[must_use]
    pub const fn last_sent(&self) -> SeqNum {
        SeqNum::new(self.next_sender_seq.saturating_sub(1))
    }

    /// Returns the last sequence number received, zero if none.
    #[inline]
    #[must_use]
    pub const fn last_received(&self) -> SeqNum {
        SeqNum::new(self.next_target_seq.saturating_sub(1))
    }

    /// Allocates and returns the next sender sequence number.
    #[inline]
    pub fn allocate_sender_seq(&mut self) -> SeqNum {
        let seq = SeqNum::new(self.next_sender_seq);
        self.next_sender_seq += 1;
        seq
    }

    /// Records an inbound message with the given sequence number.
    #[inline]
    pub fn on_received(&mut self, seq: SeqNum) {
        self.next_target_seq = self.next_target_seq.max(seq.value() + 1);
    }

    /// Overwrites both values from a persisted `(last_sent, last_received)` pair.
    pub fn restore(&mut self, last_sent: SeqNum, last_received: SeqNum) {
        *self = Self::continuing(last_sent, last_received);
    }

    /// Resets both sequence numbers to 1.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SequenceNumbers {
    fn default() -> Self {
        Self::new()
    }
}
