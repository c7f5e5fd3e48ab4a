/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session identity strategies.
//!
//! A strategy turns the identifying fields of a connection into a stable
//! [`SessionId`], so that a counterparty reconnecting is recognised as the same
//! logical session.

use fixgate_core::types::{CompId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifying fields of a session, from our point of view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    /// Our CompID.
    pub local_comp_id: CompId,
    /// The counterparty's CompID.
    pub remote_comp_id: CompId,
}

impl CompositeKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(local_comp_id: CompId, remote_comp_id: CompId) -> Self {
        Self {
            local_comp_id,
            remote_comp_id,
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.local_comp_id, self.remote_comp_id)
    }
}

/// Produces and validates session identities.
pub trait SessionIdStrategy: Send + Sync + fmt::Debug {
    /// Returns the session id for a key. Must be stable and never
    /// `SessionId::UNKNOWN`.
    fn session_id(&self, key: &CompositeKey) -> SessionId;

    /// Returns false to reject a logon for this key.
    fn accepts(&self, _key: &CompositeKey) -> bool {
        true
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Identifies sessions by the sender/target CompID pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct SenderTargetStrategy;

impl SenderTargetStrategy {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SessionIdStrategy for SenderTargetStrategy {
    fn session_id(&self, key: &CompositeKey) -> SessionId {
        let hash = fnv1a(FNV_OFFSET, key.local_comp_id.as_str().as_bytes());
        let hash = fnv1a(hash, &[0x01]);
        let hash = fnv1a(hash, key.remote_comp_id.as_str().as_bytes());
        if hash == SessionId::UNKNOWN.value() {
            SessionId::new(1)
        } else {
            SessionId::new(hash)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(local: &str, remote: &str) -> CompositeKey {
        CompositeKey::new(CompId::new(local).unwrap(), CompId::new(remote).unwrap())
    }

    #[test]
    fn test_session_id_is_stable() {
        let strategy = SenderTargetStrategy::new();
        let first = strategy.session_id(&key("GATEWAY", "CLIENT"));
        let second = strategy.session_id(&key("GATEWAY", "CLIENT"));
        assert_eq!(first, second);
        assert!(first.is_known());
    }

    #[test]
    fn test_session_id_is_directional() {
        let strategy = SenderTargetStrategy::new();
        assert_ne!(
            strategy.session_id(&key("A", "B")),
            strategy.session_id(&key("B", "A"))
        );
        assert_ne!(
            strategy.session_id(&key("AB", "C")),
            strategy.session_id(&key("A", "BC"))
        );
    }

    #[test]
    fn test_accepts_by_default() {
        assert!(SenderTargetStrategy::new().accepts(&key("A", "B")));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key("A", "B").to_string(), "A->B");
    }
}
