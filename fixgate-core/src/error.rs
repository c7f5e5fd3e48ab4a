/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the fixgate gateway.
//!
//! This module provides a unified error hierarchy using `thiserror`. Errors
//! never cross a command queue: units convert failures into outcome commands,
//! so these types surface only at the bootstrap and `initiate` boundaries and
//! inside a single unit.

use crate::types::SessionId;
use thiserror::Error;

/// Result type alias using [`GatewayError`] as the error type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for all gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A bounded command queue rejected an enqueue.
    #[error("command queue full: {queue}")]
    QueueFull {
        /// Name of the destination queue.
        queue: &'static str,
    },

    /// An initiated connection did not activate in time.
    #[error("connection to {address} not active after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Remote address that was being connected to.
        address: String,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The outbound connect attempt failed before the timeout.
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed {
        /// Remote address that was being connected to.
        address: String,
        /// Description of the failure.
        reason: String,
    },

    /// A session failed to authenticate before its deadline.
    #[error("authentication timed out for session {session_id}")]
    AuthenticationTimeout {
        /// The session that timed out.
        session_id: SessionId,
    },

    /// The replicated transport reported a failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Data was addressed to a session nobody owns.
    #[error("unrecognized session: {session_id}")]
    UnrecognizedSession {
        /// The unknown session identity.
        session_id: SessionId,
    },

    /// Error in session state handling.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error from the network layer.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The gateway has been closed.
    #[error("gateway closed")]
    Closed,
}

/// Errors from the replicated publish/subscribe transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel is full; the offer may be retried.
    #[error("back pressured on {channel} channel")]
    BackPressured {
        /// Channel name.
        channel: &'static str,
    },

    /// The channel has been closed.
    #[error("{channel} channel closed")]
    Closed {
        /// Channel name.
        channel: &'static str,
    },

    /// The transport could not be constructed.
    #[error("transport construction failed: {0}")]
    Construction(String),
}

impl TransportError {
    /// Returns true if the failure is transient.
    #[must_use]
    pub fn is_back_pressure(&self) -> bool {
        matches!(self, Self::BackPressured { .. })
    }
}

/// Errors in gateway session state handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation not valid in the current state.
    #[error("cannot {operation} from state {from}")]
    InvalidTransition {
        /// Current state name.
        from: &'static str,
        /// Attempted operation.
        operation: &'static str,
    },

    /// A required configuration field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}
