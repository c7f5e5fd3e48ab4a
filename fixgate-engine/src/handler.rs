/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Inbound message callback interface.
//!
//! The receiver hands every complete inbound frame to an [`InboundHandler`]
//! on its own thread.

use bytes::Bytes;
use crossbeam_channel::Sender;
use fixgate_core::types::{ConnectionId, SessionId};
use fixgate_session::state::DisconnectReason;
use std::fmt;
use tracing::{debug, info};

/// Callback interface for inbound traffic.
pub trait InboundHandler: Send + fmt::Debug {
    /// Called for every complete inbound frame.
    ///
    /// # Arguments
    /// * `session_id` - The session, `SessionId::UNKNOWN` before an acceptor's logon
    /// * `connection_id` - The connection the frame arrived on
    /// * `frame` - The complete frame, from `8=` through the checksum
    fn on_message(&mut self, session_id: SessionId, connection_id: ConnectionId, frame: &Bytes);

    /// Called when the receiver stops reading a connection.
    fn on_disconnect(
        &mut self,
        _session_id: SessionId,
        _connection_id: ConnectionId,
        _reason: DisconnectReason,
    ) {
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoOpHandler;

impl InboundHandler for NoOpHandler {
    fn on_message(&mut self, _session_id: SessionId, _connection_id: ConnectionId, _frame: &Bytes) {
    }
}

/// Logs every frame at debug level.
#[derive(Debug, Default)]
pub struct LoggingHandler;

impl InboundHandler for LoggingHandler {
    fn on_message(&mut self, session_id: SessionId, connection_id: ConnectionId, frame: &Bytes) {
        debug!(
            %session_id,
            %connection_id,
            bytes = frame.len(),
            frame = %String::from_utf8_lossy(frame).replace('\x01', "|"),
            "inbound"
        );
    }

    fn on_disconnect(
        &mut self,
        session_id: SessionId,
        connection_id: ConnectionId,
        reason: DisconnectReason,
    ) {
        info!(%session_id, %connection_id, %reason, "inbound connection ended");
    }
}

/// An inbound frame with its routing information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Session the frame belongs to.
    pub session_id: SessionId,
    /// Connection it arrived on.
    pub connection_id: ConnectionId,
    /// The frame.
    pub frame: Bytes,
}

/// Forwards frames to a channel for consumption on another thread.
#[derive(Debug, Clone)]
pub struct ForwardingHandler {
    tx: Sender<InboundMessage>,
}

impl ForwardingHandler {
    /// Creates a handler that sends into `tx`.
    #[must_use]
    pub const fn new(tx: Sender<InboundMessage>) -> Self {
        Self { tx }
    }
}

impl InboundHandler for ForwardingHandler {
    fn on_message(&mut self, session_id: SessionId, connection_id: ConnectionId, frame: &Bytes) {
        let message = InboundMessage {
            session_id,
            connection_id,
            frame: frame.clone(),
        };
        if self.tx.send(message).is_err() {
            debug!(%connection_id, "inbound consumer gone, frame dropped");
        }
    }
}
