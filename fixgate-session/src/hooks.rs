/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Acceptor and initiator session hooks.

use crate::sequence::SequenceNumbers;
use crate::state::{DisconnectReason, SessionHooks};
use fixgate_core::types::{ConnectionType, SeqNum};
use tracing::debug;

/// Hooks for sessions the counterparty connected to.
///
/// Acceptor sessions persist their sequence numbers so that a reconnect can
/// continue where the previous connection stopped.
#[derive(Debug, Default)]
pub struct AcceptorHooks {
    sequence: SequenceNumbers,
    persisted: bool,
    last_logon_ms: Option<u64>,
    closed: bool,
}

impl AcceptorHooks {
    /// Creates hooks with fresh sequence numbers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once [`SessionHooks::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SessionHooks for AcceptorHooks {
    fn last_logon_time(&self) -> Option<u64> {
        self.last_logon_ms
    }

    fn on_logon(&mut self, time_ms: u64) {
        self.last_logon_ms = Some(time_ms);
    }

    fn acceptor_sequence_numbers(&mut self, last_sent: SeqNum, last_received: SeqNum) {
        self.sequence.restore(last_sent, last_received);
        self.persisted = true;
    }

    fn sequence_numbers(&self) -> Option<(SeqNum, SeqNum)> {
        self.persisted
            .then(|| (self.sequence.last_sent(), self.sequence.last_received()))
    }

    fn allocate_sender_seq(&mut self) -> SeqNum {
        self.sequence.allocate_sender_seq()
    }

    fn on_disconnect(&mut self, reason: DisconnectReason) {
        debug!(
            %reason,
            last_sent = %self.sequence.last_sent(),
            last_received = %self.sequence.last_received(),
            "acceptor session offline"
        );
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Hooks for sessions we connected out on.
#[derive(Debug)]
pub struct InitiatorHooks {
    sequence: SequenceNumbers,
    reset_seq_num: bool,
    last_logon_ms: Option<u64>,
    closed: bool,
}

impl InitiatorHooks {
    /// Creates initiator hooks.
    ///
    /// # Arguments
    /// * `reset_seq_num` - Whether sequence numbers restart at 1 on every logon
    #[must_use]
    pub fn new(reset_seq_num: bool) -> Self {
        Self {
            sequence: SequenceNumbers::new(),
            reset_seq_num,
            last_logon_ms: None,
            closed: false,
        }
    }

    /// Returns true once [`SessionHooks::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SessionHooks for InitiatorHooks {
    fn last_logon_time(&self) -> Option<u64> {
        self.last_logon_ms
    }

    fn on_logon(&mut self, time_ms: u64) {
        self.last_logon_ms = Some(time_ms);
    }

    fn acceptor_sequence_numbers(&mut self, _last_sent: SeqNum, _last_received: SeqNum) {}

    fn sequence_numbers(&self) -> Option<(SeqNum, SeqNum)> {
        None
    }

    fn allocate_sender_seq(&mut self) -> SeqNum {
        self.sequence.allocate_sender_seq()
    }

    fn on_disconnect(&mut self, reason: DisconnectReason) {
        debug!(%reason, "initiator session offline");
        if self.reset_seq_num {
            self.sequence.reset();
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Creates the hooks for a connection role.
///
/// # Arguments
/// * `connection_type` - Acceptor or initiator
/// * `reset_seq_num` - Initiator only: restart sequence numbers on each logon
#[must_use]
pub fn hooks_for(connection_type: ConnectionType, reset_seq_num: bool) -> Box<dyn SessionHooks> {
    match connection_type {
        ConnectionType::Acceptor => Box::new(AcceptorHooks::new()),
        ConnectionType::Initiator => Box::new(InitiatorHooks::new(reset_seq_num)),
    }
}
