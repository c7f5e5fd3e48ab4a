/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Routes replicated data-stream fragments to TCP connections.

use fixgate_core::error::GatewayError;
use fixgate_core::types::{ConnectionId, SessionId};
use fixgate_replication::transport::FragmentHandler;
use fixgate_transport::endpoint::SenderEndPoint;
use std::collections::HashMap;
use tracing::{error, warn};

/// Writes each fragment to the connection of its session.
///
/// Fragments for sessions with no registered connection are counted and
/// dropped. Write failures are recorded so the sender can disconnect the
/// affected sessions after the poll.
#[derive(Debug, Default)]
pub struct Multiplexer {
    endpoints: HashMap<SessionId, SenderEndPoint>,
    unrecognized: u64,
    failures: Vec<SessionId>,
}

impl Multiplexer {
    /// Creates an empty multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `session_id` to `endpoint`, returning any endpoint it replaces.
    pub fn register(
        &mut self,
        session_id: SessionId,
        endpoint: SenderEndPoint,
    ) -> Option<SenderEndPoint> {
        self.endpoints.insert(session_id, endpoint)
    }

    /// Stops routing `session_id`.
    pub fn remove(&mut self, session_id: SessionId) -> Option<SenderEndPoint> {
        self.endpoints.remove(&session_id)
    }

    /// Returns the connection a session is routed to.
    #[must_use]
    pub fn connection_of(&self, session_id: SessionId) -> Option<ConnectionId> {
        self.endpoints
            .get(&session_id)
            .map(SenderEndPoint::connection_id)
    }

    /// Flushes every endpoint's backlog.
    ///
    /// # Returns
    /// The number of bytes written.
    pub fn flush(&mut self) -> usize {
        let mut written = 0;
        for (session_id, endpoint) in &mut self.endpoints {
            match endpoint.flush() {
                Ok(n) => written += n,
                Err(e) => {
                    error!(%session_id, error = %e, "flush failed");
                    self.failures.push(*session_id);
                }
            }
        }
        written
    }

    /// Closes and forgets every endpoint.
    pub fn close_all(&mut self) {
        for (_, mut endpoint) in self.endpoints.drain() {
            endpoint.close();
        }
    }

    /// Returns and clears the sessions whose writes failed.
    pub fn take_failures(&mut self) -> Vec<SessionId> {
        let mut failures = std::mem::take(&mut self.failures);
        failures.dedup();
        failures
    }

    /// Returns the number of fragments dropped for unknown sessions.
    #[inline]
    #[must_use]
    pub const fn unrecognized_count(&self) -> u64 {
        self.unrecognized
    }

    /// Returns the number of routed sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if nothing is routed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl FragmentHandler for Multiplexer {
    fn on_fragment(&mut self, session_id: SessionId, payload: &[u8]) {
        let Some(endpoint) = self.endpoints.get_mut(&session_id) else {
            self.unrecognized += 1;
            warn!(error = %GatewayError::UnrecognizedSession { session_id }, "fragment dropped");
            return;
        };
        if let Err(e) = endpoint.write(payload) {
            error!(%session_id, error = %e, "write failed");
            self.failures.push(session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixgate_transport::endpoint::split_stream;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    fn connected_pair() -> (SenderEndPoint, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        let (_receiver, sender) = split_stream(server, ConnectionId::new(1), 1024).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        (sender, client)
    }

    #[test]
    fn test_routes_by_session() {
        let (endpoint, mut client) = connected_pair();
        let mut multiplexer = Multiplexer::new();
        assert!(multiplexer.register(SessionId::new(5), endpoint).is_none());
        assert_eq!(
            multiplexer.connection_of(SessionId::new(5)),
            Some(ConnectionId::new(1))
        );

        multiplexer.on_fragment(SessionId::new(5), b"hello");
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert!(multiplexer.take_failures().is_empty());
    }

    #[test]
    fn test_unknown_session_is_counted() {
        let mut multiplexer = Multiplexer::new();
        multiplexer.on_fragment(SessionId::new(99), b"lost");
        multiplexer.on_fragment(SessionId::new(99), b"lost");
        assert_eq!(multiplexer.unrecognized_count(), 2);
        assert!(multiplexer.is_empty());
    }

    #[test]
    fn test_remove_stops_routing() {
        let (endpoint, _client) = connected_pair();
        let mut multiplexer = Multiplexer::new();
        multiplexer.register(SessionId::new(5), endpoint);
        assert!(multiplexer.remove(SessionId::new(5)).is_some());
        multiplexer.on_fragment(SessionId::new(5), b"x");
        assert_eq!(multiplexer.unrecognized_count(), 1);
        assert_eq!(multiplexer.len(), 0);
    }
}
