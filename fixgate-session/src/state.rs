/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Gateway session state machine.
//!
//! One [`GatewaySession`] exists per live connection. Acceptor and initiator
//! sessions share this structure; what differs between the roles is supplied
//! through a boxed [`SessionHooks`] implementation.
//!
//! ```text
//! Unauthenticated -> Authenticating -> Active
//!        \                 |             /
//!         +------------> Disconnected <-+
//! ```

use fixgate_core::error::SessionError;
use fixgate_core::types::{
    ConnectionId, ConnectionType, Deadline, LibraryId, SeqNum, SessionId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Lifecycle state of a gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Connection exists, no logon exchange has begun.
    Unauthenticated,
    /// Logon exchange in progress, deadline armed.
    Authenticating,
    /// Logon completed.
    Active,
    /// Terminal.
    Disconnected,
}

impl SessionState {
    /// Returns a short name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Active => "active",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a session was disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The authentication deadline elapsed.
    AuthenticationTimeout,
    /// An administrative deadline set by `disconnect_at` elapsed.
    Scheduled,
    /// The remote end closed the connection.
    PeerClosed,
    /// A Logout was received.
    Logout,
    /// Reading or writing the socket failed.
    IoError,
    /// The inbound byte stream could not be framed.
    ProtocolError,
    /// The replicated transport failed to deliver to this session.
    TransportFailure,
    /// An initiated session activated after its caller gave up.
    Abandoned,
    /// The gateway is shutting down.
    Shutdown,
    /// A user of the session asked for it.
    ApplicationRequested,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthenticationTimeout => "authentication timeout",
            Self::Scheduled => "scheduled",
            Self::PeerClosed => "peer closed",
            Self::Logout => "logout",
            Self::IoError => "io error",
            Self::ProtocolError => "protocol error",
            Self::TransportFailure => "transport failure",
            Self::Abandoned => "abandoned",
            Self::Shutdown => "shutdown",
            Self::ApplicationRequested => "application requested",
        };
        f.write_str(name)
    }
}

/// Role specific behaviour plugged into a [`GatewaySession`].
///
/// The state machine guarantees when these are called; implementations decide
/// what the values mean.
pub trait SessionHooks: Send + fmt::Debug {
    /// Epoch milliseconds of the last successful logon, if any.
    fn last_logon_time(&self) -> Option<u64>;

    /// Called when the session becomes active.
    fn on_logon(&mut self, time_ms: u64);

    /// Persists the sequence numbers of an acceptor session.
    ///
    /// Called on activation and when an offline record is consumed.
    fn acceptor_sequence_numbers(&mut self, last_sent: SeqNum, last_received: SeqNum);

    /// Returns the persisted `(last_sent, last_received)` pair, if any.
    fn sequence_numbers(&self) -> Option<(SeqNum, SeqNum)>;

    /// Allocates the sequence number for the next outbound message.
    fn allocate_sender_seq(&mut self) -> SeqNum;

    /// Role specific per-tick work.
    fn poll(&mut self, _time_ms: u64) -> usize {
        0
    }

    /// Called exactly once when the session disconnects.
    fn on_disconnect(&mut self, reason: DisconnectReason);

    /// Releases any resources held by the hooks.
    fn close(&mut self);
}

/// A session bound to one physical connection.
#[derive(Debug)]
pub struct GatewaySession {
    connection_id: ConnectionId,
    session_id: SessionId,
    library_id: LibraryId,
    address: String,
    connection_type: ConnectionType,
    authentication_timeout_ms: u64,
    disconnect_time: Deadline,
    has_started_authentication: bool,
    authentication_resolved: bool,
    state: SessionState,
    disconnect_reason: Option<DisconnectReason>,
    closed: bool,
    hooks: Box<dyn SessionHooks>,
}

impl GatewaySession {
    /// Creates a new unauthenticated session owned by the engine.
    ///
    /// # Arguments
    /// * `connection_id` - Id of the physical connection
    /// * `session_id` - Logical session id, `SessionId::UNKNOWN` for acceptors before logon
    /// * `address` - Remote endpoint description
    /// * `connection_type` - Acceptor or initiator
    /// * `authentication_timeout_ms` - Time allowed for the logon exchange
    /// * `hooks` - Role specific behaviour
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        session_id: SessionId,
        address: impl Into<String>,
        connection_type: ConnectionType,
        authentication_timeout_ms: u64,
        hooks: Box<dyn SessionHooks>,
    ) -> Self {
        Self {
            connection_id,
            session_id,
            library_id: LibraryId::ENGINE,
            address: address.into(),
            connection_type,
            authentication_timeout_ms,
            disconnect_time: Deadline::NONE,
            has_started_authentication: false,
            authentication_resolved: false,
            state: SessionState::Unauthenticated,
            disconnect_reason: None,
            closed: false,
            hooks,
        }
    }

    /// Sets the owning library.
    #[must_use]
    pub fn with_library_id(mut self, library_id: LibraryId) -> Self {
        self.library_id = library_id;
        self
    }

    /// Begins the logon exchange and arms the authentication deadline.
    ///
    /// Calling this again while authenticating recomputes the deadline.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidTransition` from `Active` or `Disconnected`.
    pub fn start_authentication(&mut self, time_ms: u64) -> Result<(), SessionError> {
        match self.state {
            SessionState::Unauthenticated | SessionState::Authenticating => {}
            other => {
                return Err(SessionError::InvalidTransition {
                    from: other.name(),
                    operation: "start authentication",
                });
            }
        }
        self.has_started_authentication = true;
        self.authentication_resolved = false;
        self.state = SessionState::Authenticating;
        self.disconnect_time =
            Deadline::at(time_ms.saturating_add(self.authentication_timeout_ms));
        debug!(
            connection_id = %self.connection_id,
            deadline = %self.disconnect_time,
            "authentication started"
        );
        Ok(())
    }

    /// Marks the pending authentication as resolved and clears its deadline.
    ///
    /// The caller decides between [`activate`](Self::activate) and
    /// [`disconnect`](Self::disconnect).
    pub fn on_authentication_result(&mut self) {
        self.authentication_resolved = true;
        self.disconnect_time = Deadline::NONE;
    }

    /// Completes a successful logon.
    ///
    /// # Arguments
    /// * `time_ms` - Logon time in epoch milliseconds
    /// * `last_sent` - Sequence number of the last message sent
    /// * `last_received` - Sequence number of the last message received
    ///
    /// # Errors
    /// Returns `SessionError::InvalidTransition` if already active or disconnected.
    pub fn activate(
        &mut self,
        time_ms: u64,
        last_sent: SeqNum,
        last_received: SeqNum,
    ) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::Active | SessionState::Disconnected) {
            return Err(SessionError::InvalidTransition {
                from: self.state.name(),
                operation: "activate",
            });
        }
        if !self.authentication_resolved {
            self.on_authentication_result();
        }
        self.state = SessionState::Active;
        self.hooks.on_logon(time_ms);
        if self.connection_type == ConnectionType::Acceptor {
            self.hooks.acceptor_sequence_numbers(last_sent, last_received);
        }
        info!(
            connection_id = %self.connection_id,
            session_id = %self.session_id,
            connection_type = %self.connection_type,
            "session active"
        );
        Ok(())
    }

    /// Runs one tick of deadline enforcement and role specific work.
    ///
    /// # Returns
    /// The number of work items performed.
    pub fn poll(&mut self, time_ms: u64, _time_ns: u64) -> usize {
        if self.state == SessionState::Disconnected {
            return 0;
        }
        if self.disconnect_time.is_expired(time_ms) {
            let reason = if self.is_authenticating() {
                DisconnectReason::AuthenticationTimeout
            } else {
                DisconnectReason::Scheduled
            };
            self.disconnect(reason);
            return 1;
        }
        self.hooks.poll(time_ms)
    }

    /// Schedules a disconnect, replacing any existing deadline.
    pub fn disconnect_at(&mut self, deadline_ms: u64) {
        self.disconnect_time = Deadline::at(deadline_ms);
    }

    /// Moves the session to `Disconnected`.
    ///
    /// # Returns
    /// `true` if this call performed the transition.
    pub fn disconnect(&mut self, reason: DisconnectReason) -> bool {
        if self.state == SessionState::Disconnected {
            return false;
        }
        info!(
            connection_id = %self.connection_id,
            session_id = %self.session_id,
            from = %self.state,
            %reason,
            "session disconnected"
        );
        self.state = SessionState::Disconnected;
        self.authentication_resolved = true;
        self.disconnect_time = Deadline::NONE;
        self.disconnect_reason = Some(reason);
        self.hooks.on_disconnect(reason);
        true
    }

    /// Takes over ownership state from an offline record of the same session.
    ///
    /// Only the library id is copied. Acceptor sessions that have not yet
    /// activated additionally restore the offline record's persisted sequence
    /// numbers; an active session keeps the numbers it is already using.
    pub fn consume_offline_session(&mut self, old: &GatewaySession) {
        self.library_id = old.library_id;
        if self.connection_type == ConnectionType::Acceptor
            && self.state != SessionState::Active
            && let Some((last_sent, last_received)) = old.hooks.sequence_numbers()
        {
            self.hooks.acceptor_sequence_numbers(last_sent, last_received);
        }
    }

    /// Releases the hooks' resources. Only the first call has an effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.hooks.close();
    }

    /// Sets the session id learned from an acceptor's logon.
    pub fn assign_session_id(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    /// Changes the owning library.
    pub fn set_library_id(&mut self, library_id: LibraryId) {
        self.library_id = library_id;
    }

    /// Allocates the sequence number for the next outbound message.
    pub fn allocate_sender_seq(&mut self) -> SeqNum {
        self.hooks.allocate_sender_seq()
    }

    /// Persists sequence numbers for acceptor sessions.
    pub fn acceptor_sequence_numbers(&mut self, last_sent: SeqNum, last_received: SeqNum) {
        self.hooks.acceptor_sequence_numbers(last_sent, last_received);
    }

    /// Epoch milliseconds of the last logon, if any.
    #[must_use]
    pub fn last_logon_time(&self) -> Option<u64> {
        self.hooks.last_logon_time()
    }

    /// Returns the persisted sequence numbers, if any.
    #[must_use]
    pub fn sequence_numbers(&self) -> Option<(SeqNum, SeqNum)> {
        self.hooks.sequence_numbers()
    }

    /// Returns true while a logon exchange is pending.
    #[inline]
    #[must_use]
    pub const fn is_authenticating(&self) -> bool {
        self.has_started_authentication && !self.authentication_resolved
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the owning library.
    #[inline]
    #[must_use]
    pub const fn library_id(&self) -> LibraryId {
        self.library_id
    }

    /// Returns the remote address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the connection role.
    #[inline]
    #[must_use]
    pub const fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Returns the configured authentication timeout.
    #[inline]
    #[must_use]
    pub const fn authentication_timeout_ms(&self) -> u64 {
        self.authentication_timeout_ms
    }

    /// Returns the current disconnect deadline.
    #[inline]
    #[must_use]
    pub const fn disconnect_time(&self) -> Deadline {
        self.disconnect_time
    }

    /// Returns true once authentication has been started.
    #[inline]
    #[must_use]
    pub const fn has_started_authentication(&self) -> bool {
        self.has_started_authentication
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true if the session is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Returns why the session disconnected, if it has.
    #[inline]
    #[must_use]
    pub const fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    /// Returns true once [`close`](Self::close) has run.
    #[inline]
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::AcceptorHooks;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counters {
        disconnects: AtomicUsize,
        closes: AtomicUsize,
        logons: AtomicUsize,
    }

    #[derive(Debug)]
    struct CountingHooks {
        counters: Arc<Counters>,
        sequence: Option<(SeqNum, SeqNum)>,
    }

    impl SessionHooks for CountingHooks {
        fn last_logon_time(&self) -> Option<u64> {
            None
        }

        fn on_logon(&mut self, _time_ms: u64) {
            self.counters.logons.fetch_add(1, Ordering::SeqCst);
        }

        fn acceptor_sequence_numbers(&mut self, last_sent: SeqNum, last_received: SeqNum) {
            self.sequence = Some((last_sent, last_received));
        }

        fn sequence_numbers(&self) -> Option<(SeqNum, SeqNum)> {
            self.sequence
        }

        fn allocate_sender_seq(&mut self) -> SeqNum {
            SeqNum::new(1)
        }

        fn on_disconnect(&mut self, _reason: DisconnectReason) {
            self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&mut self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn session(connection_type: ConnectionType, timeout_ms: u64) -> (GatewaySession, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let hooks = CountingHooks {
            counters: Arc::clone(&counters),
            sequence: None,
        };
        let session = GatewaySession::new(
            ConnectionId::new(1),
            SessionId::new(10),
            "127.0.0.1:9880",
            connection_type,
            timeout_ms,
            Box::new(hooks),
        );
        (session, counters)
    }

    #[test]
    fn test_new_session_has_no_deadline() {
        let (session, _) = session(ConnectionType::Initiator, 500);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.disconnect_time(), Deadline::NONE);
        assert!(!session.has_started_authentication());
        assert_eq!(session.library_id(), LibraryId::ENGINE);
    }

    #[test]
    fn test_start_authentication_sets_deadline() {
        let (mut session, _) = session(ConnectionType::Initiator, 500);
        session.start_authentication(1000).unwrap();
        assert!(session.has_started_authentication());
        assert!(session.is_authenticating());
        assert_eq!(session.disconnect_time(), Deadline::at(1500));

        session.start_authentication(2000).unwrap();
        assert_eq!(session.disconnect_time(), Deadline::at(2500));
    }

    #[test]
    fn test_authentication_timeout_boundary() {
        let (mut session, counters) = session(ConnectionType::Acceptor, 500);
        session.start_authentication(1000).unwrap();

        assert_eq!(session.poll(1499, 0), 0);
        assert_eq!(session.state(), SessionState::Authenticating);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 0);

        assert_eq!(session.poll(1500, 0), 1);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(
            session.disconnect_reason(),
            Some(DisconnectReason::AuthenticationTimeout)
        );

        assert_eq!(session.poll(1501, 0), 0);
        assert_eq!(session.poll(5000, 0), 0);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_authentication_result_clears_deadline() {
        let (mut session, counters) = session(ConnectionType::Initiator, 500);
        session.start_authentication(1000).unwrap();
        session.on_authentication_result();
        assert_eq!(session.disconnect_time(), Deadline::NONE);
        assert!(!session.is_authenticating());

        assert_eq!(session.poll(10_000, 0), 0);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_activate_clears_deadline_and_persists_acceptor_sequence() {
        let (mut session, counters) = session(ConnectionType::Acceptor, 500);
        session.start_authentication(1000).unwrap();
        session
            .activate(1200, SeqNum::new(3), SeqNum::new(4))
            .unwrap();

        assert!(session.is_active());
        assert_eq!(session.disconnect_time(), Deadline::NONE);
        assert_eq!(counters.logons.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.sequence_numbers(),
            Some((SeqNum::new(3), SeqNum::new(4)))
        );
        assert!(session.start_authentication(1300).is_err());
        assert!(session.activate(1300, SeqNum::new(1), SeqNum::new(1)).is_err());
    }

    #[test]
    fn test_initiator_activation_does_not_persist_sequence() {
        let (mut session, _) = session(ConnectionType::Initiator, 500);
        session.start_authentication(1000).unwrap();
        session
            .activate(1200, SeqNum::new(3), SeqNum::new(4))
            .unwrap();
        assert_eq!(session.sequence_numbers(), None);
    }

    #[test]
    fn test_disconnect_at_on_active_session() {
        let (mut session, _) = session(ConnectionType::Initiator, 500);
        session.start_authentication(1000).unwrap();
        session.activate(1100, SeqNum::new(1), SeqNum::new(1)).unwrap();

        session.disconnect_at(3000);
        session.disconnect_at(2000);
        assert_eq!(session.disconnect_time(), Deadline::at(2000));
        assert_eq!(session.poll(1999, 0), 0);
        assert_eq!(session.poll(2000, 0), 1);
        assert_eq!(session.disconnect_reason(), Some(DisconnectReason::Scheduled));
    }

    #[test]
    fn test_disconnect_runs_hook_once() {
        let (mut session, counters) = session(ConnectionType::Initiator, 500);
        assert!(session.disconnect(DisconnectReason::PeerClosed));
        assert!(!session.disconnect(DisconnectReason::IoError));
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(session.disconnect_reason(), Some(DisconnectReason::PeerClosed));
        assert!(session.start_authentication(1).is_err());
    }

    #[test]
    fn test_close_is_guarded() {
        let (mut session, counters) = session(ConnectionType::Initiator, 500);
        session.close();
        session.close();
        assert!(session.is_closed());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_consume_offline_session_copies_library_only() {
        let mut old = GatewaySession::new(
            ConnectionId::new(7),
            SessionId::new(99),
            "10.0.0.1:1000",
            ConnectionType::Acceptor,
            500,
            Box::new(AcceptorHooks::new()),
        )
        .with_library_id(LibraryId::new(5));
        old.acceptor_sequence_numbers(SeqNum::new(20), SeqNum::new(30));

        let (mut session, _) = session(ConnectionType::Acceptor, 500);
        session.consume_offline_session(&old);

        assert_eq!(session.library_id(), LibraryId::new(5));
        assert_eq!(session.connection_id(), ConnectionId::new(1));
        assert_eq!(session.session_id(), SessionId::new(10));
        assert_eq!(session.address(), "127.0.0.1:9880");
        assert_eq!(
            session.sequence_numbers(),
            Some((SeqNum::new(20), SeqNum::new(30)))
        );
    }

    #[test]
    fn test_consume_offline_session_keeps_active_sequence() {
        let mut old = GatewaySession::new(
            ConnectionId::new(7),
            SessionId::new(10),
            "10.0.0.1:1000",
            ConnectionType::Acceptor,
            500,
            Box::new(AcceptorHooks::new()),
        )
        .with_library_id(LibraryId::new(4));
        old.acceptor_sequence_numbers(SeqNum::new(2), SeqNum::new(1));

        let (mut session, _) = session(ConnectionType::Acceptor, 500);
        session.start_authentication(1000).unwrap();
        session
            .activate(1100, SeqNum::new(1), SeqNum::new(1))
            .unwrap();
        session.consume_offline_session(&old);

        assert_eq!(session.library_id(), LibraryId::new(4));
        assert_eq!(
            session.sequence_numbers(),
            Some((SeqNum::new(1), SeqNum::new(1)))
        );
    }

    #[test]
    fn test_assign_session_id() {
        let (mut session, _) = session(ConnectionType::Acceptor, 500);
        session.assign_session_id(SessionId::new(77));
        assert_eq!(session.session_id(), SessionId::new(77));
        session.set_library_id(LibraryId::new(3));
        assert_eq!(session.library_id(), LibraryId::new(3));
    }
}
