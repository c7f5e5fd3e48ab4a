/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Caller-side handle to an active session.

use crate::command::{CommandProducer, SenderCommand};
use fixgate_core::error::{GatewayError, Result};
use fixgate_core::types::{ConnectionId, LibraryId, SessionId};
use fixgate_replication::transport::Publication;
use std::fmt;
use std::sync::Arc;

/// Handle returned by a successful `initiate`.
///
/// Outbound frames are offered on the replicated data stream under the
/// session's id; the sender writes them to the connection.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    connection_id: ConnectionId,
    library_id: LibraryId,
    address: String,
    publication: Arc<dyn Publication>,
    sender: CommandProducer<SenderCommand>,
}

impl SessionHandle {
    pub(crate) fn new(
        session_id: SessionId,
        connection_id: ConnectionId,
        library_id: LibraryId,
        address: String,
        publication: Arc<dyn Publication>,
        sender: CommandProducer<SenderCommand>,
    ) -> Self {
        Self {
            session_id,
            connection_id,
            library_id,
            address,
            publication,
            sender,
        }
    }

    /// Returns the logical session id.
    #[inline]
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Returns the library that owned the session at logon.
    #[inline]
    #[must_use]
    pub const fn library_id(&self) -> LibraryId {
        self.library_id
    }

    /// Returns the remote address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends a complete, already framed message.
    ///
    /// # Errors
    /// Returns `GatewayError::Transport` if the data stream refuses it.
    pub fn send(&self, frame: &[u8]) -> Result<()> {
        self.publication.offer(self.session_id, frame)?;
        Ok(())
    }

    /// Asks the sender to disconnect the session on its next tick.
    ///
    /// # Errors
    /// Returns `GatewayError::QueueFull` if the sender queue is full.
    pub fn request_disconnect(&self) -> Result<()> {
        self.sender
            .enqueue(SenderCommand::Disconnect {
                connection_id: self.connection_id,
            })
            .map_err(|_| GatewayError::QueueFull {
                queue: self.sender.name(),
            })
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("connection_id", &self.connection_id)
            .field("library_id", &self.library_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_queue;
    use fixgate_replication::in_process::InProcessTransport;
    use fixgate_replication::transport::{ReplicationTransport, StreamChannel};

    #[test]
    fn test_send_and_disconnect() {
        let transport = InProcessTransport::new(8).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        let mut source = transport.open_subscription(StreamChannel::Data).unwrap();
        let (producer, mut queue) = command_queue("sender", 1);
        let handle = SessionHandle::new(
            SessionId::new(11),
            ConnectionId::new(3),
            LibraryId::ENGINE,
            "127.0.0.1:9000".to_string(),
            publication,
            producer,
        );

        handle.send(b"frame").unwrap();
        let mut seen = Vec::new();
        source.poll(&mut |id: SessionId, bytes: &[u8]| seen.push((id, bytes.to_vec())), 4);
        assert_eq!(seen, vec![(SessionId::new(11), b"frame".to_vec())]);

        handle.request_disconnect().unwrap();
        assert!(matches!(
            handle.request_disconnect(),
            Err(GatewayError::QueueFull { queue: "sender" })
        ));
        let mut commands = Vec::new();
        queue.drain(|c| commands.push(c));
        assert!(matches!(
            commands.as_slice(),
            [SenderCommand::Disconnect { connection_id }] if *connection_id == ConnectionId::new(3)
        ));
        assert_eq!(handle.address(), "127.0.0.1:9000");
    }
}
