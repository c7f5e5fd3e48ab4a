/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound session-level messages.
//!
//! The sender emits Logon and Logout through a [`SessionProxy`], which frames
//! them and offers them on the replicated data stream. They reach the socket
//! the same way application traffic does.

use fixgate_core::error::TransportError;
use fixgate_core::types::SessionId;
use fixgate_replication::transport::Publication;
use fixgate_transport::frame::{AdminEncoder, HeaderFields};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Attempts made against a back-pressured publication before giving up.
pub const DEFAULT_OFFER_ATTEMPTS: usize = 64;

/// Emits session-level messages for a session.
pub trait SessionProxy: Send + fmt::Debug {
    /// Sends a Logon.
    ///
    /// # Errors
    /// Returns the transport error if the message could not be published.
    fn send_logon(
        &mut self,
        session_id: SessionId,
        header: &HeaderFields<'_>,
        heartbeat_interval_secs: u64,
        reset_seq_num: bool,
    ) -> Result<(), TransportError>;

    /// Sends a Logout.
    ///
    /// # Errors
    /// Returns the transport error if the message could not be published.
    fn send_logout(
        &mut self,
        session_id: SessionId,
        header: &HeaderFields<'_>,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Frames admin messages onto a publication.
#[derive(Debug)]
pub struct FramingSessionProxy {
    encoder: AdminEncoder,
    publication: Arc<dyn Publication>,
    max_attempts: usize,
}

impl FramingSessionProxy {
    /// Creates a proxy publishing on `publication`.
    ///
    /// # Arguments
    /// * `encoder_buffer_size` - Initial capacity of the encoding buffer
    /// * `publication` - The data stream publication
    #[must_use]
    pub fn new(encoder_buffer_size: usize, publication: Arc<dyn Publication>) -> Self {
        Self {
            encoder: AdminEncoder::new(encoder_buffer_size),
            publication,
            max_attempts: DEFAULT_OFFER_ATTEMPTS,
        }
    }

    /// Sets the number of offer attempts under back pressure.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl SessionProxy for FramingSessionProxy {
    fn send_logon(
        &mut self,
        session_id: SessionId,
        header: &HeaderFields<'_>,
        heartbeat_interval_secs: u64,
        reset_seq_num: bool,
    ) -> Result<(), TransportError> {
        let frame = self
            .encoder
            .logon(header, heartbeat_interval_secs, reset_seq_num);
        debug!(%session_id, seq = %header.msg_seq_num, "sending logon");
        self.publication
            .offer_retry(session_id, &frame, self.max_attempts)
    }

    fn send_logout(
        &mut self,
        session_id: SessionId,
        header: &HeaderFields<'_>,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let frame = self.encoder.logout(header, text);
        debug!(%session_id, seq = %header.msg_seq_num, "sending logout");
        self.publication
            .offer_retry(session_id, &frame, self.max_attempts)
    }
}
