/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixgate Session
//!
//! Per-connection session lifecycle for the fixgate gateway.
//!
//! This crate provides:
//! - **State machine**: the gateway session with authentication deadlines
//! - **Hooks**: role specific behaviour for acceptor and initiator sessions
//! - **Sequence numbers**: last sent / last received bookkeeping
//! - **Configuration**: per-session connection settings
//! - **Identity**: pluggable session identity strategies

pub mod config;
pub mod hooks;
pub mod sequence;
pub mod state;
pub mod strategy;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use hooks::{AcceptorHooks, InitiatorHooks, hooks_for};
pub use sequence::SequenceNumbers;
pub use state::{DisconnectReason, GatewaySession, SessionHooks, SessionState};
pub use strategy::{CompositeKey, SenderTargetStrategy, SessionIdStrategy};
