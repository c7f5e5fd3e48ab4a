/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixgate Core
//!
//! Core types and error definitions shared by every fixgate crate.
//!
//! This crate provides:
//! - **Identifiers**: `ConnectionId`, `SessionId`, `LibraryId`, `CompId`, `SeqNum`
//! - **Deadlines**: an explicit optional deadline instead of a magic timeout value
//! - **Clocks**: wall-clock and manually driven time sources
//! - **Error types**: the gateway error taxonomy built on `thiserror`

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GatewayError, Result, SessionError, TransportError};
pub use types::{
    CompId, ConnectionId, ConnectionType, Deadline, LibraryId, SeqNum, SessionId,
};
