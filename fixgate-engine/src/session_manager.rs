/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The session manager unit.
//!
//! Keeps session-identity bookkeeping: which library owns each session, which
//! connection it is on and, while disconnected, its offline record. Ownership
//! changes are published on the control stream.

use crate::agent::Agent;
use crate::command::{CommandQueue, SessionManagerCommand};
use crate::proxy::SenderProxy;
use fixgate_core::error::GatewayError;
use fixgate_core::types::{ConnectionId, ConnectionType, LibraryId, SessionId};
use fixgate_replication::control::ControlRecord;
use fixgate_replication::subscription::Subscription;
use fixgate_replication::transport::{FragmentHandler, Publication};
use fixgate_session::state::GatewaySession;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Control-stream records handled per tick.
const FRAGMENT_LIMIT: usize = 16;

/// Offer attempts for a control record.
const CONTROL_OFFER_ATTEMPTS: usize = 16;

/// Ownership state of one session.
#[derive(Debug)]
struct SessionOwnership {
    library_id: LibraryId,
    connection_id: Option<ConnectionId>,
    connection_type: ConnectionType,
    offline: Option<Box<GatewaySession>>,
}

/// The replicated view of session ownership, built from the control stream.
#[derive(Debug, Default)]
pub struct ControlLog {
    owners: HashMap<SessionId, LibraryId>,
    offline: u64,
    malformed: u64,
}

impl ControlLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last published owner of a session.
    #[must_use]
    pub fn owner_of(&self, session_id: SessionId) -> Option<LibraryId> {
        self.owners.get(&session_id).copied()
    }

    /// Returns the number of offline notifications seen.
    #[must_use]
    pub const fn offline_count(&self) -> u64 {
        self.offline
    }

    /// Returns the number of records that failed to decode.
    #[must_use]
    pub const fn malformed_count(&self) -> u64 {
        self.malformed
    }
}

impl FragmentHandler for ControlLog {
    fn on_fragment(&mut self, session_id: SessionId, payload: &[u8]) {
        match ControlRecord::decode(payload) {
            Some(ControlRecord::OwnershipChanged {
                session_id,
                library_id,
            }) => {
                debug!(%session_id, %library_id, "ownership changed");
                self.owners.insert(session_id, library_id);
            }
            Some(ControlRecord::SessionOffline { session_id }) => {
                debug!(%session_id, "session offline");
                self.offline += 1;
            }
            None => {
                self.malformed += 1;
                warn!(%session_id, bytes = payload.len(), "malformed control record");
            }
        }
    }
}

/// The session manager unit.
#[derive(Debug)]
pub struct SessionManager {
    commands: CommandQueue<SessionManagerCommand>,
    state: ManagerState,
}

#[derive(Debug)]
struct ManagerState {
    sessions: HashMap<SessionId, SessionOwnership>,
    sender: SenderProxy,
    control_publication: Arc<dyn Publication>,
    control: Subscription<ControlLog>,
}

impl SessionManager {
    /// Creates the session manager unit.
    ///
    /// # Arguments
    /// * `commands` - The session manager command queue
    /// * `sender` - Commands to the sender
    /// * `control_publication` - Control stream publication
    /// * `control` - Control stream subscription
    #[must_use]
    pub fn new(
        commands: CommandQueue<SessionManagerCommand>,
        sender: SenderProxy,
        control_publication: Arc<dyn Publication>,
        control: Subscription<ControlLog>,
    ) -> Self {
        Self {
            commands,
            state: ManagerState {
                sessions: HashMap::new(),
                sender,
                control_publication,
                control,
            },
        }
    }

    /// Returns the current owner of a session.
    #[must_use]
    pub fn library_of(&self, session_id: SessionId) -> Option<LibraryId> {
        self.state.sessions.get(&session_id).map(|s| s.library_id)
    }

    /// Returns true if the session is held offline.
    #[must_use]
    pub fn is_offline(&self, session_id: SessionId) -> bool {
        self.state
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.offline.is_some())
    }

    /// Returns the replicated ownership view.
    #[must_use]
    pub fn control_log(&self) -> &ControlLog {
        self.state.control.handler()
    }
}

impl Agent for SessionManager {
    fn role_name(&self) -> &'static str {
        "session-manager"
    }

    fn do_work(&mut self) -> usize {
        let state = &mut self.state;
        let mut work = state.sender.flush();
        work += self.commands.drain(|command| state.on_command(command));
        work += state.control.poll(FRAGMENT_LIMIT);
        work
    }

    fn on_close(&mut self) {
        let state = &mut self.state;
        for (_, ownership) in state.sessions.drain() {
            if let Some(mut offline) = ownership.offline {
                offline.close();
            }
        }
        state.control.close();
        state.sender.flush();
        info!("session manager closed");
    }
}

impl ManagerState {
    fn on_command(&mut self, command: SessionManagerCommand) {
        match command {
            SessionManagerCommand::SessionLogon {
                session_id,
                connection_id,
            } => self.on_session_logon(session_id, connection_id),
            SessionManagerCommand::SessionActive {
                session_id,
                connection_id,
                connection_type,
                library_id,
            } => self.on_session_active(session_id, connection_id, connection_type, library_id),
            SessionManagerCommand::SessionOffline { session } => self.on_session_offline(session),
            SessionManagerCommand::TransferOwnership {
                session_id,
                library_id,
            } => self.on_transfer_ownership(session_id, library_id),
        }
    }

    /// Hands the offline record, if any, to the connection that logged on.
    ///
    /// The sender holds the Logon reply until this answer arrives, so the
    /// reply continues the record's sequence numbers.
    fn on_session_logon(&mut self, session_id: SessionId, connection_id: ConnectionId) {
        let offline = self.sessions.get_mut(&session_id).and_then(|ownership| {
            let offline = ownership.offline.take()?;
            ownership.library_id = offline.library_id();
            ownership.connection_id = Some(connection_id);
            Some(offline)
        });
        if offline.is_some() {
            debug!(%session_id, %connection_id, "offline record handed to logon");
        }
        self.sender.reclaim_offline_session(connection_id, offline);
    }

    fn on_session_active(
        &mut self,
        session_id: SessionId,
        connection_id: ConnectionId,
        connection_type: ConnectionType,
        library_id: LibraryId,
    ) {
        let ownership = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| SessionOwnership {
                library_id,
                connection_id: None,
                connection_type,
                offline: None,
            });
        ownership.connection_id = Some(connection_id);
        ownership.connection_type = connection_type;
        match ownership.offline.take() {
            Some(offline) => {
                ownership.library_id = offline.library_id();
                info!(%session_id, %connection_id, library_id = %ownership.library_id, "session reconnected");
                self.sender.reclaim_offline_session(connection_id, Some(offline));
            }
            None => {
                ownership.library_id = library_id;
                info!(%session_id, %connection_id, %library_id, "session active");
            }
        }
    }

    fn on_session_offline(&mut self, session: Box<GatewaySession>) {
        let session_id = session.session_id();
        let ownership = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| SessionOwnership {
                library_id: session.library_id(),
                connection_id: None,
                connection_type: session.connection_type(),
                offline: None,
            });
        ownership.connection_id = None;
        ownership.library_id = session.library_id();
        if let Some(mut replaced) = ownership.offline.replace(session) {
            replaced.close();
        }
        info!(%session_id, "session held offline");
        self.publish(ControlRecord::SessionOffline { session_id });
    }

    fn on_transfer_ownership(&mut self, session_id: SessionId, library_id: LibraryId) {
        let Some(ownership) = self.sessions.get_mut(&session_id) else {
            warn!(error = %GatewayError::UnrecognizedSession { session_id }, "ownership transfer ignored");
            return;
        };
        ownership.library_id = library_id;
        match ownership.offline.as_mut() {
            Some(offline) => offline.set_library_id(library_id),
            None => self.sender.library_changed(session_id, library_id),
        }
        info!(%session_id, %library_id, "ownership transferred");
        self.publish(ControlRecord::OwnershipChanged {
            session_id,
            library_id,
        });
    }

    fn publish(&self, record: ControlRecord) {
        let session_id = record.session_id();
        if let Err(e) =
            self.control_publication
                .offer_retry(session_id, &record.encode(), CONTROL_OFFER_ATTEMPTS)
        {
            warn!(%session_id, error = %e, "control record not published");
        }
    }
}
