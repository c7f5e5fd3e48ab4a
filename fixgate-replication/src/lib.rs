/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixgate Replication
//!
//! The replicated publish/subscribe substrate the gateway units talk over.
//!
//! This crate provides:
//! - **Transport traits**: publications, fragment sources and handlers
//! - **Subscriptions**: a source bound to its single handler
//! - **In-process transport**: ordered multicast over bounded channels
//! - **Streams**: the data and control channel pairs
//! - **Control records**: coordination messages on the control channel

pub mod control;
pub mod in_process;
pub mod streams;
pub mod subscription;
pub mod transport;

pub use control::ControlRecord;
pub use in_process::InProcessTransport;
pub use streams::ReplicationStreams;
pub use subscription::Subscription;
pub use transport::{
    FragmentHandler, FragmentSource, Publication, ReplicationTransport, StreamChannel,
};
