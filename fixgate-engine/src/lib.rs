/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixgate Engine
//!
//! The concurrency substrate of the fixgate gateway.
//!
//! This crate provides:
//! - **Command queues**: bounded mailboxes with per-destination proxies
//! - **Agents**: the sender, receiver and session manager polling units
//! - **Runners**: named threads driven by a backoff idle strategy
//! - **Multiplexer**: routes the replicated data stream to TCP connections
//! - **Gateway**: launches everything and offers a blocking `initiate`

pub mod agent;
pub mod command;
pub mod config;
pub mod connector;
pub mod gateway;
pub mod handle;
pub mod handler;
pub mod idle;
pub mod multiplexer;
pub mod proxy;
pub mod receiver;
pub mod rendezvous;
pub mod sender;
pub mod session_manager;
pub mod session_proxy;

pub use agent::{Agent, AgentRunner};
pub use command::{
    CommandProducer, CommandQueue, QueueFull, ReceiverCommand, SenderCommand,
    SessionManagerCommand, command_queue,
};
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use gateway::FixGateway;
pub use handle::SessionHandle;
pub use handler::{
    ForwardingHandler, InboundHandler, InboundMessage, LoggingHandler, NoOpHandler,
};
pub use idle::{BackoffIdleStrategy, IdleConfig};
pub use multiplexer::Multiplexer;
pub use proxy::{ReceiverProxy, SenderProxy, SessionManagerProxy};
pub use receiver::Receiver;
pub use rendezvous::{InitiateOutcome, InitiateRendezvous};
pub use sender::{Sender, SenderLinks, SenderSettings};
pub use session_manager::{ControlLog, SessionManager};
pub use session_proxy::{FramingSessionProxy, SessionProxy};
