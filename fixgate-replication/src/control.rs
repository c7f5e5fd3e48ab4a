/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Coordination records carried on the control channel.
//!
//! Layout: one kind byte followed by little endian fields.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use fixgate_core::types::{LibraryId, SessionId};

const KIND_OWNERSHIP_CHANGED: u8 = 1;
const KIND_SESSION_OFFLINE: u8 = 2;

/// A coordination record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRecord {
    /// A session is now administered by `library_id`.
    OwnershipChanged {
        /// The session.
        session_id: SessionId,
        /// Its new owner.
        library_id: LibraryId,
    },
    /// A session lost its connection and is held offline.
    SessionOffline {
        /// The session.
        session_id: SessionId,
    },
}

impl ControlRecord {
    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(13);
        match *self {
            Self::OwnershipChanged {
                session_id,
                library_id,
            } => {
                buf.put_u8(KIND_OWNERSHIP_CHANGED);
                buf.put_u64_le(session_id.value());
                buf.put_i32_le(library_id.value());
            }
            Self::SessionOffline { session_id } => {
                buf.put_u8(KIND_SESSION_OFFLINE);
                buf.put_u64_le(session_id.value());
            }
        }
        buf.freeze()
    }

    /// Decodes a record, returning `None` for unknown or truncated input.
    #[must_use]
    pub fn decode(mut bytes: &[u8]) -> Option<Self> {
        if !bytes.has_remaining() {
            return None;
        }
        match bytes.get_u8() {
            KIND_OWNERSHIP_CHANGED if bytes.remaining() >= 12 => Some(Self::OwnershipChanged {
                session_id: SessionId::new(bytes.get_u64_le()),
                library_id: LibraryId::new(bytes.get_i32_le()),
            }),
            KIND_SESSION_OFFLINE if bytes.remaining() >= 8 => Some(Self::SessionOffline {
                session_id: SessionId::new(bytes.get_u64_le()),
            }),
            _ => None,
        }
    }

    /// Returns the session the record is about.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        match *self {
            Self::OwnershipChanged { session_id, .. } | Self::SessionOffline { session_id } => {
                session_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_changed_layout() {
        let record = ControlRecord::OwnershipChanged {
            session_id: SessionId::new(0x0102),
            library_id: LibraryId::new(-1),
        };
        let bytes = record.encode();
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes[0], KIND_OWNERSHIP_CHANGED);
        assert_eq!(&bytes[1..3], &[0x02, 0x01]);
        assert_eq!(ControlRecord::decode(&bytes), Some(record));
        assert_eq!(record.session_id(), SessionId::new(0x0102));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(ControlRecord::decode(&[]), None);
        assert_eq!(ControlRecord::decode(&[9, 0, 0]), None);
        assert_eq!(ControlRecord::decode(&[KIND_SESSION_OFFLINE, 1, 2]), None);
    }
}
