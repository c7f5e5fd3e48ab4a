/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixgate Transport
//!
//! Network transport layer for the fixgate gateway.
//!
//! This crate provides:
//! - **Codec**: FIX tag=value framing over a TCP byte stream
//! - **Checksum**: tag 10 calculation and parsing
//! - **Admin frames**: Logon and Logout encoding plus header inspection
//! - **Endpoints**: non-blocking TCP read and write halves

pub mod checksum;
pub mod codec;
pub mod endpoint;
pub mod frame;

pub use codec::{CodecError, FixCodec};
pub use endpoint::{EndpointError, ReceiverEndPoint, SenderEndPoint, split_stream};
pub use frame::{AdminEncoder, FrameHeader, HeaderFields, MsgKind};
