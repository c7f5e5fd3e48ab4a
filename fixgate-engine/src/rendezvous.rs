/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Hand-off between a blocked `initiate` caller and the sender unit.
//!
//! One slot, armed with a correlation id by the caller. The sender fills it
//! with the outcome of that attempt. An outcome for any other id, or arriving
//! after the caller has given up, is refused so the sender can tear the
//! session down.

use crate::handle::SessionHandle;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// How an initiate attempt ended.
#[derive(Debug, Clone)]
pub enum InitiateOutcome {
    /// The session logged on.
    Active(SessionHandle),
    /// The connect attempt failed.
    Failed(String),
}

#[derive(Debug, Default)]
struct Slot {
    armed: Option<u64>,
    outcome: Option<InitiateOutcome>,
}

/// Single-waiter rendezvous for initiate outcomes.
#[derive(Debug)]
pub struct InitiateRendezvous {
    slot: Mutex<Slot>,
    ready: Condvar,
    next_id: AtomicU64,
}

impl Default for InitiateRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl InitiateRendezvous {
    /// Creates an unarmed rendezvous.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            ready: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Arms the slot for a new attempt.
    ///
    /// # Returns
    /// The correlation id of the attempt.
    pub fn arm(&self) -> u64 {
        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.slot.lock();
        slot.armed = Some(correlation_id);
        slot.outcome = None;
        correlation_id
    }

    /// Clears the slot if it is still armed for `correlation_id`.
    pub fn disarm(&self, correlation_id: u64) {
        let mut slot = self.slot.lock();
        if slot.armed == Some(correlation_id) {
            slot.armed = None;
            slot.outcome = None;
        }
    }

    /// Delivers a successful logon.
    ///
    /// # Returns
    /// `false` if nobody is waiting for `correlation_id`.
    pub fn on_initiator_session_active(&self, correlation_id: u64, handle: SessionHandle) -> bool {
        self.complete(correlation_id, InitiateOutcome::Active(handle))
    }

    /// Delivers a failed connect.
    ///
    /// # Returns
    /// `false` if nobody is waiting for `correlation_id`.
    pub fn on_initiator_connect_failed(&self, correlation_id: u64, reason: String) -> bool {
        self.complete(correlation_id, InitiateOutcome::Failed(reason))
    }

    fn complete(&self, correlation_id: u64, outcome: InitiateOutcome) -> bool {
        let mut slot = self.slot.lock();
        if slot.armed != Some(correlation_id) || slot.outcome.is_some() {
            debug!(correlation_id, "initiate outcome has no waiter");
            return false;
        }
        slot.outcome = Some(outcome);
        self.ready.notify_all();
        true
    }

    /// Waits for the outcome of `correlation_id` until `deadline`, then
    /// disarms the slot.
    ///
    /// # Returns
    /// `None` if no outcome arrived in time.
    pub fn await_outcome(&self, correlation_id: u64, deadline: Instant) -> Option<InitiateOutcome> {
        let mut slot = self.slot.lock();
        while slot.armed == Some(correlation_id) && slot.outcome.is_none() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        let outcome = if slot.armed == Some(correlation_id) {
            slot.outcome.take()
        } else {
            None
        };
        if slot.armed == Some(correlation_id) {
            slot.armed = None;
        }
        outcome
    }
}
