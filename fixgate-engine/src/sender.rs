/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The sender unit.
//!
//! Owns every [`GatewaySession`], the outbound half of every connection and
//! the data-stream subscription that feeds them. All session state changes
//! happen on this unit's thread.

use crate::agent::Agent;
use crate::command::{CommandProducer, CommandQueue, SenderCommand};
use crate::connector::Connector;
use crate::handle::SessionHandle;
use crate::multiplexer::Multiplexer;
use crate::proxy::{ReceiverProxy, SessionManagerProxy};
use crate::rendezvous::InitiateRendezvous;
use crate::session_proxy::SessionProxy;
use fixgate_core::clock::Clock;
use fixgate_core::error::{GatewayError, TransportError};
use fixgate_core::types::{
    CompId, ConnectionId, ConnectionType, LibraryId, SeqNum, SessionId,
};
use fixgate_replication::subscription::Subscription;
use fixgate_replication::transport::Publication;
use fixgate_session::config::{DEFAULT_BEGIN_STRING, SessionConfig};
use fixgate_session::hooks::hooks_for;
use fixgate_session::state::{DisconnectReason, GatewaySession, SessionState};
use fixgate_session::strategy::{CompositeKey, SessionIdStrategy};
use fixgate_transport::endpoint::{SenderEndPoint, split_stream};
use fixgate_transport::frame::HeaderFields;
use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Data-stream fragments handled per tick.
const FRAGMENT_LIMIT: usize = 64;

/// Tunables of the sender unit.
#[derive(Debug, Clone, Copy)]
pub struct SenderSettings {
    /// Time allowed for logon, in milliseconds.
    pub authentication_timeout_ms: u64,
    /// Timeout of each outbound TCP connect.
    pub connect_timeout: Duration,
    /// Bytes read per socket read on new connections.
    pub receiver_buffer_size: usize,
    /// HeartBtInt used when replying to a Logon that carries none.
    pub default_heartbeat_secs: u64,
    /// Library that owns accepted sessions.
    pub library_id: LibraryId,
}

/// Collaborators of the sender unit.
#[derive(Debug)]
pub struct SenderLinks {
    /// Subscription to the data stream, routed through the multiplexer.
    pub data: Subscription<Multiplexer>,
    /// Data stream publication, shared with session handles.
    pub data_publication: Arc<dyn Publication>,
    /// Emits Logon and Logout.
    pub session_proxy: Box<dyn SessionProxy>,
    /// Producer of this unit's own queue, for session handles.
    pub own_queue: CommandProducer<SenderCommand>,
    /// Commands to the receiver.
    pub receiver: ReceiverProxy,
    /// Commands to the session manager.
    pub session_manager: SessionManagerProxy,
    /// Hand-off to the blocked `initiate` caller.
    pub rendezvous: Arc<InitiateRendezvous>,
}

/// Identity and logon parameters learned at connect or logon time.
#[derive(Debug, Clone)]
struct SessionContext {
    begin_string: String,
    local_comp_id: CompId,
    remote_comp_id: CompId,
    heartbeat_interval_secs: u64,
    reset_seq_num: bool,
}

impl SessionContext {
    fn header(&self, msg_seq_num: SeqNum, sending_time_ms: u64) -> HeaderFields<'_> {
        HeaderFields {
            begin_string: &self.begin_string,
            sender_comp_id: self.local_comp_id.as_str(),
            target_comp_id: self.remote_comp_id.as_str(),
            msg_seq_num,
            sending_time_ms,
        }
    }
}

#[derive(Debug)]
struct SenderSession {
    session: GatewaySession,
    context: Option<SessionContext>,
    pending_endpoint: Option<SenderEndPoint>,
    correlation_id: Option<u64>,
    /// MsgSeqNum of an acceptor Logon whose reply waits for the session
    /// manager's offline record.
    pending_logon: Option<SeqNum>,
    was_active: bool,
}

impl SenderSession {
    fn is_disconnected(&self) -> bool {
        self.session.state() == SessionState::Disconnected
    }
}

#[derive(Debug)]
struct PendingConnect {
    correlation_id: u64,
    library_id: LibraryId,
    session_id: SessionId,
    config: SessionConfig,
    connector: Connector,
}

/// The sender unit.
#[derive(Debug)]
pub struct Sender {
    commands: CommandQueue<SenderCommand>,
    state: SenderState,
}

struct SenderState {
    sessions: HashMap<ConnectionId, SenderSession>,
    connecting: Vec<PendingConnect>,
    next_connection_id: u64,
    links: SenderLinks,
    strategy: Arc<dyn SessionIdStrategy>,
    clock: Arc<dyn Clock>,
    settings: SenderSettings,
}

impl std::fmt::Debug for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderState")
            .field("sessions", &self.sessions.len())
            .field("connecting", &self.connecting.len())
            .field("next_connection_id", &self.next_connection_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Sender {
    /// Creates the sender unit.
    ///
    /// # Arguments
    /// * `commands` - The sender command queue
    /// * `links` - Streams, proxies and the initiate rendezvous
    /// * `strategy` - Maps identity fields to session ids
    /// * `clock` - Time source for deadlines
    /// * `settings` - Timeouts and buffer sizes
    #[must_use]
    pub fn new(
        commands: CommandQueue<SenderCommand>,
        links: SenderLinks,
        strategy: Arc<dyn SessionIdStrategy>,
        clock: Arc<dyn Clock>,
        settings: SenderSettings,
    ) -> Self {
        Self {
            commands,
            state: SenderState {
                sessions: HashMap::new(),
                connecting: Vec::new(),
                next_connection_id: 1,
                links,
                strategy,
                clock,
                settings,
            },
        }
    }

    /// Returns the number of connections with a session.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state.sessions.len()
    }

    /// Returns the number of outbound connects in progress.
    #[must_use]
    pub fn pending_connects(&self) -> usize {
        self.state.connecting.len()
    }
}

impl Agent for Sender {
    fn role_name(&self) -> &'static str {
        "sender"
    }

    fn do_work(&mut self) -> usize {
        let state = &mut self.state;
        let mut work = state.flush_proxies();
        work += self.commands.drain(|command| state.on_command(command));
        work += state.poll_connects();
        work += state.poll_sessions();
        work += state.poll_data();
        work += state.reap();
        work
    }

    fn on_close(&mut self) {
        self.state.shutdown();
    }
}

impl SenderState {
    fn flush_proxies(&mut self) -> usize {
        self.links.receiver.flush() + self.links.session_manager.flush()
    }

    fn on_command(&mut self, command: SenderCommand) {
        match command {
            SenderCommand::Connect {
                correlation_id,
                library_id,
                config,
            } => self.on_connect(correlation_id, library_id, config),
            SenderCommand::NewAcceptedConnection { stream, address } => {
                self.on_accepted(stream, address);
            }
            SenderCommand::LogonReceived {
                connection_id,
                key,
                begin_string,
                msg_seq_num,
                heartbeat_interval_secs,
            } => self.on_logon(
                connection_id,
                key,
                begin_string,
                msg_seq_num,
                heartbeat_interval_secs,
            ),
            SenderCommand::ConnectionClosed {
                connection_id,
                reason,
            } => self.disconnect_session(connection_id, reason),
            SenderCommand::Disconnect { connection_id } => {
                let now_ms = self.clock.time_ms();
                if let Some(entry) = self.sessions.get_mut(&connection_id) {
                    entry.session.disconnect_at(now_ms);
                }
            }
            SenderCommand::ReclaimOfflineSession {
                connection_id,
                offline,
            } => self.on_reclaim(connection_id, offline),
            SenderCommand::LibraryChanged {
                session_id,
                library_id,
            } => {
                if let Some(entry) = self.live_session_mut(session_id) {
                    entry.session.set_library_id(library_id);
                }
            }
        }
    }

    fn on_connect(&mut self, correlation_id: u64, library_id: LibraryId, config: SessionConfig) {
        let key = config.session_key();
        let session_id = self.strategy.session_id(&key);
        if self.is_session_live(session_id, None)
            || self.connecting.iter().any(|p| p.session_id == session_id)
        {
            warn!(%session_id, %key, "session already connected");
            self.links
                .rendezvous
                .on_initiator_connect_failed(correlation_id, format!("session {key} is already connected"));
            return;
        }
        let address = config.address();
        match Connector::spawn(address.clone(), self.settings.connect_timeout) {
            Ok(connector) => {
                info!(%address, %session_id, "connecting");
                self.connecting.push(PendingConnect {
                    correlation_id,
                    library_id,
                    session_id,
                    config,
                    connector,
                });
            }
            Err(e) => {
                error!(%address, error = %e, "failed to start connect");
                self.links
                    .rendezvous
                    .on_initiator_connect_failed(correlation_id, e.to_string());
            }
        }
    }

    fn poll_connects(&mut self) -> usize {
        let mut work = 0;
        let mut index = 0;
        while index < self.connecting.len() {
            let Some(result) = self.connecting[index].connector.try_result() else {
                index += 1;
                continue;
            };
            let pending = self.connecting.swap_remove(index);
            work += 1;
            match result {
                Ok(stream) => self.on_connected(pending, stream),
                Err(e) => {
                    warn!(address = %pending.connector.address(), error = %e, "connect failed");
                    self.links
                        .rendezvous
                        .on_initiator_connect_failed(pending.correlation_id, e.to_string());
                }
            }
        }
        work
    }

    fn on_connected(&mut self, pending: PendingConnect, stream: TcpStream) {
        let connection_id = self.allocate_connection_id();
        let (receiver_endpoint, sender_endpoint) =
            match split_stream(stream, connection_id, self.settings.receiver_buffer_size) {
                Ok(halves) => halves,
                Err(e) => {
                    error!(%connection_id, error = %e, "failed to configure connection");
                    self.links
                        .rendezvous
                        .on_initiator_connect_failed(pending.correlation_id, e.to_string());
                    return;
                }
            };

        let config = pending.config;
        let session_id = pending.session_id;
        let now_ms = self.clock.time_ms();
        let mut session = GatewaySession::new(
            connection_id,
            session_id,
            config.address(),
            ConnectionType::Initiator,
            self.settings.authentication_timeout_ms,
            hooks_for(ConnectionType::Initiator, config.reset_seq_num),
        )
        .with_library_id(pending.library_id);
        if let Err(e) = session.start_authentication(now_ms) {
            error!(%connection_id, error = %e, "cannot start authentication");
        }

        if let Some(mut replaced) = self
            .links
            .data
            .handler_mut()
            .register(session_id, sender_endpoint)
        {
            replaced.close();
        }

        let mut entry = SenderSession {
            session,
            context: Some(SessionContext {
                begin_string: config.begin_string.clone(),
                local_comp_id: config.sender_comp_id.clone(),
                remote_comp_id: config.target_comp_id.clone(),
                heartbeat_interval_secs: config.heartbeat_interval_secs(),
                reset_seq_num: config.reset_seq_num,
            }),
            pending_endpoint: None,
            correlation_id: Some(pending.correlation_id),
            pending_logon: None,
            was_active: false,
        };
        if let Err(e) = send_logon(self.links.session_proxy.as_mut(), now_ms, &mut entry) {
            error!(%connection_id, error = %e, "failed to send logon");
            entry.session.disconnect(DisconnectReason::TransportFailure);
        }
        info!(%connection_id, %session_id, address = %config.address(), "connected");

        self.links
            .receiver
            .new_connection(receiver_endpoint, ConnectionType::Initiator, session_id);
        self.sessions.insert(connection_id, entry);
    }

    fn on_accepted(&mut self, stream: TcpStream, address: SocketAddr) {
        let connection_id = self.allocate_connection_id();
        let (receiver_endpoint, sender_endpoint) =
            match split_stream(stream, connection_id, self.settings.receiver_buffer_size) {
                Ok(halves) => halves,
                Err(e) => {
                    warn!(%address, error = %e, "failed to configure accepted connection");
                    return;
                }
            };
        let mut session = GatewaySession::new(
            connection_id,
            SessionId::UNKNOWN,
            address.to_string(),
            ConnectionType::Acceptor,
            self.settings.authentication_timeout_ms,
            hooks_for(ConnectionType::Acceptor, false),
        )
        .with_library_id(self.settings.library_id);
        if let Err(e) = session.start_authentication(self.clock.time_ms()) {
            error!(%connection_id, error = %e, "cannot start authentication");
        }
        info!(%connection_id, %address, "accepted connection");

        self.sessions.insert(
            connection_id,
            SenderSession {
                session,
                context: None,
                pending_endpoint: Some(sender_endpoint),
                correlation_id: None,
                pending_logon: None,
                was_active: false,
            },
        );
        self.links.receiver.new_connection(
            receiver_endpoint,
            ConnectionType::Acceptor,
            SessionId::UNKNOWN,
        );
    }

    fn on_logon(
        &mut self,
        connection_id: ConnectionId,
        key: CompositeKey,
        begin_string: Option<String>,
        msg_seq_num: SeqNum,
        heartbeat_interval_secs: Option<u64>,
    ) {
        let Some(entry) = self.sessions.get(&connection_id) else {
            debug!(%connection_id, "logon for unknown connection");
            return;
        };
        if entry.session.state() != SessionState::Authenticating || entry.pending_logon.is_some() {
            debug!(%connection_id, state = %entry.session.state(), "ignoring logon");
            return;
        }
        match entry.session.connection_type() {
            ConnectionType::Acceptor => self.on_acceptor_logon(
                connection_id,
                key,
                begin_string,
                msg_seq_num,
                heartbeat_interval_secs,
            ),
            ConnectionType::Initiator => self.on_initiator_logon(connection_id, msg_seq_num),
        }
    }

    /// Validates an acceptor Logon and asks the session manager for the
    /// session's offline record. The reply is sent from `on_reclaim` once the
    /// record is resolved; until then the authentication deadline stays armed.
    fn on_acceptor_logon(
        &mut self,
        connection_id: ConnectionId,
        key: CompositeKey,
        begin_string: Option<String>,
        msg_seq_num: SeqNum,
        heartbeat_interval_secs: Option<u64>,
    ) {
        let session_id = self.strategy.session_id(&key);
        if !self.strategy.accepts(&key) {
            warn!(%connection_id, %key, "logon rejected");
            self.disconnect_session(connection_id, DisconnectReason::ProtocolError);
            return;
        }
        if self.is_session_live(session_id, Some(connection_id)) {
            warn!(%connection_id, %session_id, %key, "duplicate logon");
            self.disconnect_session(connection_id, DisconnectReason::ProtocolError);
            return;
        }
        let default_heartbeat_secs = self.settings.default_heartbeat_secs;
        let Some(entry) = self.sessions.get_mut(&connection_id) else {
            return;
        };

        entry.session.assign_session_id(session_id);
        if let Some(endpoint) = entry.pending_endpoint.take()
            && let Some(mut replaced) = self.links.data.handler_mut().register(session_id, endpoint)
        {
            replaced.close();
        }
        entry.context = Some(SessionContext {
            begin_string: begin_string.unwrap_or_else(|| DEFAULT_BEGIN_STRING.to_string()),
            local_comp_id: key.local_comp_id,
            remote_comp_id: key.remote_comp_id,
            heartbeat_interval_secs: heartbeat_interval_secs.unwrap_or(default_heartbeat_secs),
            reset_seq_num: false,
        });
        entry.pending_logon = Some(msg_seq_num);
        self.links
            .session_manager
            .session_logon(session_id, connection_id);
    }

    /// Replies to a held acceptor Logon and activates the session.
    fn complete_acceptor_logon(&mut self, connection_id: ConnectionId, msg_seq_num: SeqNum) {
        let now_ms = self.clock.time_ms();
        let Some(entry) = self.sessions.get_mut(&connection_id) else {
            return;
        };
        entry.session.on_authentication_result();
        let last_sent = match send_logon(self.links.session_proxy.as_mut(), now_ms, entry) {
            Ok(seq) => seq,
            Err(e) => {
                error!(%connection_id, error = %e, "failed to send logon reply");
                entry.session.disconnect(DisconnectReason::TransportFailure);
                return;
            }
        };
        if let Err(e) = entry.session.activate(now_ms, last_sent, msg_seq_num) {
            error!(%connection_id, error = %e, "activation failed");
            return;
        }
        entry.was_active = true;
        let session_id = entry.session.session_id();
        let library_id = entry.session.library_id();
        self.links.session_manager.session_active(
            session_id,
            connection_id,
            ConnectionType::Acceptor,
            library_id,
        );
    }

    fn on_initiator_logon(&mut self, connection_id: ConnectionId, msg_seq_num: SeqNum) {
        let now_ms = self.clock.time_ms();
        let Some(entry) = self.sessions.get_mut(&connection_id) else {
            return;
        };
        entry.session.on_authentication_result();
        if let Err(e) = entry.session.activate(now_ms, SeqNum::default(), msg_seq_num) {
            error!(%connection_id, error = %e, "activation failed");
            return;
        }
        entry.was_active = true;

        let session_id = entry.session.session_id();
        let library_id = entry.session.library_id();
        let handle = SessionHandle::new(
            session_id,
            connection_id,
            library_id,
            entry.session.address().to_string(),
            Arc::clone(&self.links.data_publication),
            self.links.own_queue.clone(),
        );
        let delivered = entry
            .correlation_id
            .take()
            .is_some_and(|id| self.links.rendezvous.on_initiator_session_active(id, handle));

        if delivered {
            self.links.session_manager.session_active(
                session_id,
                connection_id,
                ConnectionType::Initiator,
                library_id,
            );
        } else {
            warn!(%connection_id, %session_id, "activated after initiate gave up, abandoning");
            self.disconnect_session(connection_id, DisconnectReason::Abandoned);
            if let Some(entry) = self.sessions.get_mut(&connection_id) {
                entry.was_active = false;
            }
        }
    }

    fn on_reclaim(&mut self, connection_id: ConnectionId, offline: Option<Box<GatewaySession>>) {
        let target = self.sessions.get_mut(&connection_id).filter(|entry| {
            !entry.is_disconnected()
                && offline
                    .as_ref()
                    .is_none_or(|old| old.session_id() == entry.session.session_id())
        });
        let Some(entry) = target else {
            if let Some(offline) = offline {
                debug!(%connection_id, session_id = %offline.session_id(), "reclaim target gone, record kept offline");
                self.links.session_manager.session_offline(offline);
            }
            return;
        };

        if let Some(mut offline) = offline {
            entry.session.consume_offline_session(&offline);
            debug!(
                %connection_id,
                session_id = %offline.session_id(),
                library_id = %entry.session.library_id(),
                "offline session reclaimed"
            );
            offline.close();
        }
        if let Some(msg_seq_num) = entry.pending_logon.take() {
            self.complete_acceptor_logon(connection_id, msg_seq_num);
        }
    }

    /// Disconnects a session now, sending a Logout where one is due.
    fn disconnect_session(&mut self, connection_id: ConnectionId, reason: DisconnectReason) {
        let now_ms = self.clock.time_ms();
        let Some(entry) = self.sessions.get_mut(&connection_id) else {
            return;
        };
        let was_active = entry.session.is_active();
        if entry.session.disconnect(reason) && was_active && sends_logout(reason) {
            send_logout(self.links.session_proxy.as_mut(), now_ms, entry, reason);
        }
    }

    fn poll_sessions(&mut self) -> usize {
        let now_ms = self.clock.time_ms();
        let now_ns = self.clock.time_ns();
        let mut work = 0;
        for (connection_id, entry) in &mut self.sessions {
            let was_active = entry.session.is_active();
            let was_authenticating = entry.session.is_authenticating();
            work += entry.session.poll(now_ms, now_ns);
            match entry.session.disconnect_reason() {
                Some(DisconnectReason::AuthenticationTimeout) if was_authenticating => {
                    let session_id = entry.session.session_id();
                    warn!(
                        error = %GatewayError::AuthenticationTimeout { session_id },
                        %connection_id,
                        "logon not completed"
                    );
                }
                Some(reason) if was_active && sends_logout(reason) => {
                    send_logout(self.links.session_proxy.as_mut(), now_ms, entry, reason);
                }
                _ => {}
            }
        }
        work
    }

    fn poll_data(&mut self) -> usize {
        let mut work = self.links.data.poll(FRAGMENT_LIMIT);
        let multiplexer = self.links.data.handler_mut();
        if multiplexer.flush() > 0 {
            work += 1;
        }
        for session_id in multiplexer.take_failures() {
            if let Some(connection_id) = self.connection_of(session_id) {
                self.disconnect_session(connection_id, DisconnectReason::TransportFailure);
                work += 1;
            }
        }
        work
    }

    fn reap(&mut self) -> usize {
        let finished: Vec<ConnectionId> = self
            .sessions
            .iter()
            .filter(|(_, entry)| entry.is_disconnected())
            .map(|(id, _)| *id)
            .collect();
        for connection_id in &finished {
            let Some(mut entry) = self.sessions.remove(connection_id) else {
                continue;
            };
            let session_id = entry.session.session_id();
            let multiplexer = self.links.data.handler_mut();
            if multiplexer.connection_of(session_id) == Some(*connection_id)
                && let Some(mut endpoint) = multiplexer.remove(session_id)
            {
                endpoint.close();
            }
            if let Some(mut endpoint) = entry.pending_endpoint.take() {
                endpoint.close();
            }
            self.links.receiver.remove_connection(*connection_id);

            if entry.was_active {
                self.links
                    .session_manager
                    .session_offline(Box::new(entry.session));
            } else {
                entry.session.close();
            }
        }
        finished.len()
    }

    fn shutdown(&mut self) {
        let connections: Vec<ConnectionId> = self.sessions.keys().copied().collect();
        for connection_id in connections {
            self.disconnect_session(connection_id, DisconnectReason::Shutdown);
        }
        self.links.data.poll(usize::MAX);
        let multiplexer = self.links.data.handler_mut();
        multiplexer.flush();
        multiplexer.close_all();
        for (_, mut entry) in self.sessions.drain() {
            if let Some(mut endpoint) = entry.pending_endpoint.take() {
                endpoint.close();
            }
            entry.session.close();
        }
        self.connecting.clear();
        self.links.data.close();
        self.links.receiver.flush();
        self.links.session_manager.flush();
        info!("sender closed");
    }

    fn allocate_connection_id(&mut self) -> ConnectionId {
        let id = ConnectionId::new(self.next_connection_id);
        self.next_connection_id += 1;
        id
    }

    fn is_session_live(&self, session_id: SessionId, except: Option<ConnectionId>) -> bool {
        self.sessions.iter().any(|(connection_id, entry)| {
            Some(*connection_id) != except
                && entry.session.session_id() == session_id
                && !entry.is_disconnected()
        })
    }

    fn connection_of(&self, session_id: SessionId) -> Option<ConnectionId> {
        self.sessions
            .iter()
            .find(|(_, entry)| entry.session.session_id() == session_id && !entry.is_disconnected())
            .map(|(connection_id, _)| *connection_id)
    }

    fn live_session_mut(&mut self, session_id: SessionId) -> Option<&mut SenderSession> {
        self.sessions
            .values_mut()
            .find(|entry| entry.session.session_id() == session_id && !entry.is_disconnected())
    }
}

fn sends_logout(reason: DisconnectReason) -> bool {
    matches!(
        reason,
        DisconnectReason::Scheduled
            | DisconnectReason::Logout
            | DisconnectReason::ProtocolError
            | DisconnectReason::Abandoned
            | DisconnectReason::Shutdown
            | DisconnectReason::ApplicationRequested
    )
}

/// Sends a Logon for `entry`, returning the sequence number it used.
fn send_logon(
    proxy: &mut dyn SessionProxy,
    now_ms: u64,
    entry: &mut SenderSession,
) -> Result<SeqNum, TransportError> {
    let Some(context) = &entry.context else {
        return Ok(SeqNum::default());
    };
    let seq = entry.session.allocate_sender_seq();
    proxy.send_logon(
        entry.session.session_id(),
        &context.header(seq, now_ms),
        context.heartbeat_interval_secs,
        context.reset_seq_num,
    )?;
    Ok(seq)
}

fn send_logout(
    proxy: &mut dyn SessionProxy,
    now_ms: u64,
    entry: &mut SenderSession,
    reason: DisconnectReason,
) {
    let Some(context) = &entry.context else {
        return;
    };
    let seq = entry.session.allocate_sender_seq();
    let text = reason.to_string();
    if let Err(e) = proxy.send_logout(
        entry.session.session_id(),
        &context.header(seq, now_ms),
        Some(&text),
    ) {
        warn!(session_id = %entry.session.session_id(), error = %e, "failed to send logout");
    }
}
