/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! A fragment source bound to its single handler.

use crate::transport::{FragmentHandler, FragmentSource};
use fixgate_core::types::SessionId;

/// Inbound side of a channel with its registered handler.
#[derive(Debug)]
pub struct Subscription<H> {
    source: Box<dyn FragmentSource>,
    handler: H,
    closed: bool,
}

impl<H: FragmentHandler> Subscription<H> {
    /// Binds `handler` to `source`.
    #[must_use]
    pub fn new(source: Box<dyn FragmentSource>, handler: H) -> Self {
        Self {
            source,
            handler,
            closed: false,
        }
    }

    /// Delivers up to `fragment_limit` pending messages to the handler.
    ///
    /// # Returns
    /// The number of messages delivered.
    pub fn poll(&mut self, fragment_limit: usize) -> usize {
        if self.closed {
            return 0;
        }
        let handler = &mut self.handler;
        self.source.poll(
            &mut |session_id: SessionId, payload: &[u8]| handler.on_fragment(session_id, payload),
            fragment_limit,
        )
    }

    /// Returns the handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the handler mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Stops receiving. Only the first call has an effect.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.source.close();
        }
    }

    /// Returns true once closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}
