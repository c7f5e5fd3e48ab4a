/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Transport traits.
//!
//! Any substrate that preserves message boundaries and per-publication order
//! can carry the gateway's streams.

use fixgate_core::error::TransportError;
use fixgate_core::types::SessionId;
use std::fmt;
use std::sync::Arc;

/// The two logical channels of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamChannel {
    /// Application protocol payloads addressed by session id.
    Data,
    /// Internal coordination records.
    Control,
}

impl StreamChannel {
    /// Returns the channel name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Control => "control",
        }
    }
}

impl fmt::Display for StreamChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outbound side of a channel.
pub trait Publication: Send + Sync + fmt::Debug {
    /// Offers one message without blocking.
    ///
    /// # Errors
    /// `BackPressured` if the message cannot be taken now, `Closed` once the
    /// publication or its transport is closed.
    fn offer(&self, session_id: SessionId, payload: &[u8]) -> Result<(), TransportError>;

    /// Offers a message, yielding between attempts while back pressured.
    ///
    /// # Errors
    /// Returns the last error once `max_attempts` offers have failed, or
    /// immediately on a non transient error.
    fn offer_retry(
        &self,
        session_id: SessionId,
        payload: &[u8],
        max_attempts: usize,
    ) -> Result<(), TransportError> {
        let mut attempts = 0;
        loop {
            match self.offer(session_id, payload) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_back_pressure() && attempts + 1 < max_attempts => {
                    attempts += 1;
                    std::thread::yield_now();
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Closes the publication. Further offers fail.
    fn close(&self);

    /// Returns true once closed.
    fn is_closed(&self) -> bool;

    /// Returns the channel this publication writes to.
    fn channel(&self) -> StreamChannel;
}

/// Inbound side of a channel, before a handler is attached.
///
/// Sources not yet subscribed stay inside the gateway, which caller threads
/// share, so they must be `Sync`.
pub trait FragmentSource: Send + Sync + fmt::Debug {
    /// Delivers up to `fragment_limit` messages to `handler`.
    ///
    /// # Returns
    /// The number of messages delivered.
    fn poll(
        &mut self,
        handler: &mut dyn FnMut(SessionId, &[u8]),
        fragment_limit: usize,
    ) -> usize;

    /// Stops receiving.
    fn close(&mut self);
}

/// Receives messages from a [`Subscription`](crate::Subscription).
pub trait FragmentHandler {
    /// Called once per inbound message, in order.
    fn on_fragment(&mut self, session_id: SessionId, payload: &[u8]);
}

impl<F> FragmentHandler for F
where
    F: FnMut(SessionId, &[u8]),
{
    fn on_fragment(&mut self, session_id: SessionId, payload: &[u8]) {
        self(session_id, payload);
    }
}

/// Provider of publications and subscriptions.
pub trait ReplicationTransport: Send + Sync + fmt::Debug {
    /// Opens a publication on `channel`.
    ///
    /// # Errors
    /// Returns `TransportError::Closed` once the transport is closed.
    fn open_publication(
        &self,
        channel: StreamChannel,
    ) -> Result<Arc<dyn Publication>, TransportError>;

    /// Opens a subscription on `channel`.
    ///
    /// # Errors
    /// Returns `TransportError::Closed` once the transport is closed.
    fn open_subscription(
        &self,
        channel: StreamChannel,
    ) -> Result<Box<dyn FragmentSource>, TransportError>;

    /// Closes the transport and everything opened from it.
    fn close(&self);
}
