/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixgate
//!
//! A FIX session gateway.
//!
//! fixgate owns the TCP connections of FIX sessions and runs the session
//! layer (logon, logout, authentication deadlines) on dedicated polling
//! threads. Outbound application data and administrative records flow over
//! replicated publish/subscribe streams.
//!
//! ## Features
//!
//! - **Blocking initiate**: connect out and wait until the session is active
//! - **Acceptor**: accept inbound sessions and identify them by CompID pair
//! - **Bounded mailboxes**: units talk only through fixed-capacity queues
//! - **Offline sessions**: disconnected sessions are kept for reclaim
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fixgate::prelude::*;
//!
//! let gateway = FixGateway::launch(GatewayConfig::default())?;
//! let handle = gateway.initiate(SessionConfig::new(
//!     "127.0.0.1",
//!     9880,
//!     CompId::new("SENDER").unwrap(),
//!     CompId::new("TARGET").unwrap(),
//! ))?;
//! handle.send(b"8=FIX.4.4\x01...")?;
//! gateway.close();
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Identifiers, clocks and error definitions
//! - [`session`]: Session state machine and identity strategies
//! - [`transport`]: FIX framing and TCP endpoints
//! - [`replication`]: Publish/subscribe streams
//! - [`engine`]: Polling units and the gateway

pub mod core {
    //! Identifiers, clocks and error definitions.
    pub use fixgate_core::*;
}

pub mod session {
    //! Session state machine and identity strategies.
    pub use fixgate_session::*;
}

pub mod transport {
    //! FIX framing and TCP endpoints.
    pub use fixgate_transport::*;
}

pub mod replication {
    //! Publish/subscribe streams.
    pub use fixgate_replication::*;
}

pub mod engine {
    //! Polling units and the gateway.
    pub use fixgate_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use fixgate_core::{
        Clock, CompId, ConnectionId, ConnectionType, GatewayError, LibraryId, Result, SeqNum,
        SessionId, SystemClock,
    };

    // Session
    pub use fixgate_session::{
        CompositeKey, DisconnectReason, SenderTargetStrategy, SessionConfig, SessionIdStrategy,
        SessionState,
    };

    // Transport
    pub use fixgate_transport::{FrameHeader, MsgKind};

    // Engine
    pub use fixgate_engine::{
        FixGateway, ForwardingHandler, GatewayConfig, GatewayConfigBuilder, IdleConfig,
        InboundHandler, InboundMessage, LoggingHandler, NoOpHandler, SessionHandle,
    };
}
