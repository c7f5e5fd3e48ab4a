/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Typed command producers with overflow retention.
//!
//! A unit that cannot deliver a command to a full queue keeps it in a local
//! backlog and re-offers it on its next tick. Once anything is in the
//! backlog, later commands queue behind it so per-destination order holds.

use crate::command::{CommandProducer, ReceiverCommand, SenderCommand, SessionManagerCommand};
use fixgate_core::error::{GatewayError, Result};
use fixgate_core::types::{ConnectionId, ConnectionType, LibraryId, SeqNum, SessionId};
use fixgate_session::config::SessionConfig;
use fixgate_session::state::{DisconnectReason, GatewaySession};
use fixgate_session::strategy::CompositeKey;
use fixgate_transport::endpoint::ReceiverEndPoint;
use std::collections::VecDeque;
use std::net::{SocketAddr, TcpStream};
use std::time::Instant;
use tracing::warn;

/// A producer plus a backlog of commands the queue refused.
#[derive(Debug)]
pub struct CommandProxy<T> {
    producer: CommandProducer<T>,
    backlog: VecDeque<T>,
}

impl<T> CommandProxy<T> {
    /// Wraps a producer.
    #[must_use]
    pub const fn new(producer: CommandProducer<T>) -> Self {
        Self {
            producer,
            backlog: VecDeque::new(),
        }
    }

    /// Offers a command, retaining it locally if the queue is full.
    pub fn offer(&mut self, command: T) {
        if !self.backlog.is_empty() {
            self.backlog.push_back(command);
            return;
        }
        if let Err(full) = self.producer.enqueue(command) {
            warn!(queue = self.producer.name(), "command queue full, retaining");
            self.backlog.push_back(full.into_inner());
        }
    }

    /// Re-offers retained commands in order.
    ///
    /// # Returns
    /// The number of commands delivered.
    pub fn flush(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(command) = self.backlog.pop_front() {
            if let Err(full) = self.producer.enqueue(command) {
                self.backlog.push_front(full.into_inner());
                break;
            }
            delivered += 1;
        }
        delivered
    }

    /// Returns the number of retained commands.
    #[inline]
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.backlog.len()
    }

    /// Returns the wrapped producer.
    #[inline]
    #[must_use]
    pub const fn producer(&self) -> &CommandProducer<T> {
        &self.producer
    }
}

/// Commands addressed to the sender unit.
#[derive(Debug)]
pub struct SenderProxy {
    inner: CommandProxy<SenderCommand>,
}

impl SenderProxy {
    /// Wraps the sender queue producer.
    #[must_use]
    pub const fn new(producer: CommandProducer<SenderCommand>) -> Self {
        Self {
            inner: CommandProxy::new(producer),
        }
    }

    /// Requests an outbound connection, retrying until `deadline`.
    ///
    /// Used from caller threads, which have no tick to flush a backlog on.
    ///
    /// # Errors
    /// Returns `GatewayError::QueueFull` if the queue stays full until the
    /// deadline.
    pub fn connect_until(
        &self,
        correlation_id: u64,
        library_id: LibraryId,
        config: SessionConfig,
        deadline: Instant,
    ) -> Result<()> {
        let producer = self.inner.producer();
        producer
            .offer_until(
                SenderCommand::Connect {
                    correlation_id,
                    library_id,
                    config,
                },
                deadline,
            )
            .map_err(|_| GatewayError::QueueFull {
                queue: producer.name(),
            })
    }

    /// Hands an accepted socket to the sender.
    pub fn new_accepted_connection(&mut self, stream: TcpStream, address: SocketAddr) {
        self.inner
            .offer(SenderCommand::NewAcceptedConnection { stream, address });
    }

    /// Reports a Logon received on a connection.
    pub fn logon_received(
        &mut self,
        connection_id: ConnectionId,
        key: CompositeKey,
        begin_string: Option<String>,
        msg_seq_num: SeqNum,
        heartbeat_interval_secs: Option<u64>,
    ) {
        self.inner.offer(SenderCommand::LogonReceived {
            connection_id,
            key,
            begin_string,
            msg_seq_num,
            heartbeat_interval_secs,
        });
    }

    /// Reports that a connection ended.
    pub fn connection_closed(&mut self, connection_id: ConnectionId, reason: DisconnectReason) {
        self.inner.offer(SenderCommand::ConnectionClosed {
            connection_id,
            reason,
        });
    }

    /// Returns the offline record, if any, for a reconnected session.
    pub fn reclaim_offline_session(
        &mut self,
        connection_id: ConnectionId,
        offline: Option<Box<GatewaySession>>,
    ) {
        self.inner.offer(SenderCommand::ReclaimOfflineSession {
            connection_id,
            offline,
        });
    }

    /// Reports an ownership change.
    pub fn library_changed(&mut self, session_id: SessionId, library_id: LibraryId) {
        self.inner.offer(SenderCommand::LibraryChanged {
            session_id,
            library_id,
        });
    }

    /// Re-offers retained commands.
    pub fn flush(&mut self) -> usize {
        self.inner.flush()
    }

    /// Returns the number of retained commands.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.inner.backlog()
    }
}

/// Commands addressed to the receiver unit.
#[derive(Debug)]
pub struct ReceiverProxy {
    inner: CommandProxy<ReceiverCommand>,
}

impl ReceiverProxy {
    /// Wraps the receiver queue producer.
    #[must_use]
    pub const fn new(producer: CommandProducer<ReceiverCommand>) -> Self {
        Self {
            inner: CommandProxy::new(producer),
        }
    }

    /// Asks the receiver to start reading a connection.
    pub fn new_connection(
        &mut self,
        endpoint: ReceiverEndPoint,
        connection_type: ConnectionType,
        session_id: SessionId,
    ) {
        self.inner.offer(ReceiverCommand::NewConnection {
            endpoint,
            connection_type,
            session_id,
        });
    }

    /// Asks the receiver to stop reading a connection.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) {
        self.inner
            .offer(ReceiverCommand::RemoveConnection { connection_id });
    }

    /// Re-offers retained commands.
    pub fn flush(&mut self) -> usize {
        self.inner.flush()
    }

    /// Returns the number of retained commands.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.inner.backlog()
    }
}

/// Commands addressed to the session manager unit.
#[derive(Debug)]
pub struct SessionManagerProxy {
    inner: CommandProxy<SessionManagerCommand>,
}

impl SessionManagerProxy {
    /// Wraps the session manager queue producer.
    #[must_use]
    pub const fn new(producer: CommandProducer<SessionManagerCommand>) -> Self {
        Self {
            inner: CommandProxy::new(producer),
        }
    }

    /// Asks for the offline record of a session whose Logon awaits a reply.
    pub fn session_logon(&mut self, session_id: SessionId, connection_id: ConnectionId) {
        self.inner.offer(SessionManagerCommand::SessionLogon {
            session_id,
            connection_id,
        });
    }

    /// Reports a session that completed logon.
    pub fn session_active(
        &mut self,
        session_id: SessionId,
        connection_id: ConnectionId,
        connection_type: ConnectionType,
        library_id: LibraryId,
    ) {
        self.inner.offer(SessionManagerCommand::SessionActive {
            session_id,
            connection_id,
            connection_type,
            library_id,
        });
    }

    /// Hands over the record of a session that lost its connection.
    pub fn session_offline(&mut self, session: Box<GatewaySession>) {
        self.inner
            .offer(SessionManagerCommand::SessionOffline { session });
    }

    /// Requests an ownership transfer.
    pub fn transfer_ownership(&mut self, session_id: SessionId, library_id: LibraryId) {
        self.inner.offer(SessionManagerCommand::TransferOwnership {
            session_id,
            library_id,
        });
    }

    /// Re-offers retained commands.
    pub fn flush(&mut self) -> usize {
        self.inner.flush()
    }

    /// Returns the number of retained commands.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.inner.backlog()
    }
}
