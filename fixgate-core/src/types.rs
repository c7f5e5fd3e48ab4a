/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core types for gateway operations.
//!
//! This module provides the identifiers and value types used throughout fixgate:
//! - [`ConnectionId`]: one physical TCP connection
//! - [`SessionId`]: one logical session, which may outlive its connections
//! - [`LibraryId`]: the logical owner administering a session
//! - [`ConnectionType`]: acceptor or initiator role
//! - [`Deadline`]: optional disconnect deadline in epoch milliseconds
//! - [`SeqNum`] and [`CompId`]: protocol level values

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// Identifier of a physical connection.
///
/// Connection ids are assigned when a connection is accepted or initiated and
/// are never reused within a gateway process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a connection id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a logical session.
///
/// A session keeps its id across reconnects; the id is produced by the
/// configured session identity strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Placeholder for acceptor connections that have not logged on yet.
    pub const UNKNOWN: Self = Self(0);

    /// Creates a session id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns true if the identity has been resolved.
    #[inline]
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.0 != Self::UNKNOWN.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the library that currently administers a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct LibraryId(i32);

impl LibraryId {
    /// Sessions owned by the gateway itself.
    pub const ENGINE: Self = Self(0);

    /// Creates a library id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for LibraryId {
    fn default() -> Self {
        Self::ENGINE
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a connection, fixed for the life of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// The counterparty connected to our listening socket.
    Acceptor,
    /// We connected out to the counterparty.
    Initiator,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acceptor => f.write_str("acceptor"),
            Self::Initiator => f.write_str("initiator"),
        }
    }
}

/// An optional point in time, in epoch milliseconds, at which a session
/// must be disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(Option<u64>);

impl Deadline {
    /// No deadline is scheduled.
    pub const NONE: Self = Self(None);

    /// A deadline at the given epoch millisecond.
    #[inline]
    #[must_use]
    pub const fn at(time_ms: u64) -> Self {
        Self(Some(time_ms))
    }

    /// Returns the deadline value, if any.
    #[inline]
    #[must_use]
    pub const fn time_ms(self) -> Option<u64> {
        self.0
    }

    /// Returns true if a deadline is scheduled.
    #[inline]
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0.is_some()
    }

    /// Returns true if a deadline is scheduled and `now_ms` has reached it.
    #[inline]
    #[must_use]
    pub const fn is_expired(self, now_ms: u64) -> bool {
        match self.0 {
            Some(deadline) => now_ms >= deadline,
            None => false,
        }
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ms) => write!(f, "{}ms", ms),
            None => f.write_str("none"),
        }
    }
}

/// FIX message sequence number.
///
/// Sequence numbers start at 1 and increment for each message sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Creates a new sequence number.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence number value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for SeqNum {
    fn default() -> Self {
        Self(1)
    }
}

impl From<u64> for SeqNum {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component identifier for FIX sessions.
///
/// Used for SenderCompID (tag 49) and TargetCompID (tag 56).
/// Maximum length is 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompId from a string slice.
    ///
    /// # Returns
    /// `Some(CompId)` if the string is non-empty and fits, `None` otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the CompId as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or_else(|| arrayvec::CapacityError::new(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_none_never_expires() {
        assert!(!Deadline::NONE.is_set());
        assert!(!Deadline::NONE.is_expired(0));
        assert!(!Deadline::NONE.is_expired(u64::MAX));
    }

    #[test]
    fn test_deadline_expiry_is_inclusive() {
        let deadline = Deadline::at(1500);
        assert!(deadline.is_set());
        assert!(!deadline.is_expired(1499));
        assert!(deadline.is_expired(1500));
        assert!(deadline.is_expired(1501));
    }

    #[test]
    fn test_session_id_unknown() {
        assert!(!SessionId::UNKNOWN.is_known());
        assert!(SessionId::new(42).is_known());
    }

    #[test]
    fn test_library_id_default_is_engine() {
        assert_eq!(LibraryId::default(), LibraryId::ENGINE);
        assert_eq!(LibraryId::new(7).value(), 7);
    }

    #[test]
    fn test_seq_num_operations() {
        let seq = SeqNum::new(5);
        assert_eq!(seq.value(), 5);
        assert_eq!(seq.next().value(), 6);
        assert_eq!(SeqNum::default().value(), 1);
    }

    #[test]
    fn test_comp_id() {
        let id = CompId::new("SENDER").unwrap();
        assert_eq!(id.as_str(), "SENDER");
        assert!(CompId::new("").is_none());
        assert!(CompId::new(&"A".repeat(COMP_ID_MAX_LEN + 1)).is_none());
        assert_eq!("TARGET".parse::<CompId>().unwrap().as_str(), "TARGET");
    }

    #[test]
    fn test_connection_type_display() {
        assert_eq!(ConnectionType::Acceptor.to_string(), "acceptor");
        assert_eq!(ConnectionType::Initiator.to_string(), "initiator");
    }
}
