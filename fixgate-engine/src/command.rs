/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Command queues and the commands they carry.
//!
//! Each unit consumes exactly one queue. Producers are cheap cloneable
//! handles; the consumer is unique. Commands offered through one producer are
//! drained in offer order.

use crossbeam_queue::ArrayQueue;
use fixgate_core::types::{ConnectionId, ConnectionType, LibraryId, SeqNum, SessionId};
use fixgate_session::config::SessionConfig;
use fixgate_session::state::{DisconnectReason, GatewaySession};
use fixgate_session::strategy::CompositeKey;
use fixgate_transport::endpoint::ReceiverEndPoint;
use std::fmt;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Instant;

/// Default queue capacity, sized for control-plane traffic.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// A rejected enqueue, handing the command back.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Returns the rejected command.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Creates a bounded queue.
///
/// # Arguments
/// * `name` - Queue name used in diagnostics
/// * `capacity` - Maximum queued commands, at least 1
#[must_use]
pub fn command_queue<T>(name: &'static str, capacity: usize) -> (CommandProducer<T>, CommandQueue<T>) {
    let queue = Arc::new(ArrayQueue::new(capacity.max(1)));
    (
        CommandProducer {
            queue: Arc::clone(&queue),
            name,
        },
        CommandQueue { queue, name },
    )
}

/// Producer side of a command queue.
pub struct CommandProducer<T> {
    queue: Arc<ArrayQueue<T>>,
    name: &'static str,
}

impl<T> CommandProducer<T> {
    /// Enqueues without blocking.
    ///
    /// # Errors
    /// Returns the command inside `QueueFull` if the queue is at capacity.
    pub fn enqueue(&self, command: T) -> Result<(), QueueFull<T>> {
        self.queue.push(command).map_err(QueueFull)
    }

    /// Retries an enqueue, yielding between attempts, until `deadline`.
    ///
    /// # Errors
    /// Returns the command inside `QueueFull` if the deadline passes.
    pub fn offer_until(&self, mut command: T, deadline: Instant) -> Result<(), QueueFull<T>> {
        loop {
            match self.queue.push(command) {
                Ok(()) => return Ok(()),
                Err(rejected) if Instant::now() < deadline => {
                    command = rejected;
                    std::thread::yield_now();
                }
                Err(rejected) => return Err(QueueFull(rejected)),
            }
        }
    }

    /// Returns the queue name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of queued commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Clone for CommandProducer<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            name: self.name,
        }
    }
}

impl<T> fmt::Debug for CommandProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandProducer")
            .field("name", &self.name)
            .field("len", &self.queue.len())
            .finish()
    }
}

/// Consumer side of a command queue.
pub struct CommandQueue<T> {
    queue: Arc<ArrayQueue<T>>,
    name: &'static str,
}

impl<T> CommandQueue<T> {
    /// Executes `f` on every command available when the call starts, in
    /// FIFO order.
    ///
    /// # Returns
    /// The number of commands executed.
    pub fn drain<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(T),
    {
        let available = self.queue.len();
        let mut executed = 0;
        while executed < available {
            let Some(command) = self.queue.pop() else {
                break;
            };
            f(command);
            executed += 1;
        }
        executed
    }

    /// Returns the queue name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for CommandQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("name", &self.name)
            .field("len", &self.queue.len())
            .finish()
    }
}

/// Commands consumed by the sender unit.
#[derive(Debug)]
pub enum SenderCommand {
    /// Connect out and log on.
    Connect {
        /// Identifies the `initiate` call waiting for the result.
        correlation_id: u64,
        /// Owner of the new session.
        library_id: LibraryId,
        /// Where to connect and who we are.
        config: SessionConfig,
    },
    /// The receiver accepted a socket.
    NewAcceptedConnection {
        /// The accepted stream.
        stream: TcpStream,
        /// Remote address.
        address: SocketAddr,
    },
    /// A Logon arrived on a connection.
    LogonReceived {
        /// Connection it arrived on.
        connection_id: ConnectionId,
        /// Identity fields, from our point of view.
        key: CompositeKey,
        /// BeginString of the Logon.
        begin_string: Option<String>,
        /// MsgSeqNum of the Logon.
        msg_seq_num: SeqNum,
        /// HeartBtInt of the Logon.
        heartbeat_interval_secs: Option<u64>,
    },
    /// A connection ended from the receiver's point of view.
    ConnectionClosed {
        /// The connection.
        connection_id: ConnectionId,
        /// Why it ended.
        reason: DisconnectReason,
    },
    /// Disconnect a connection on the next tick.
    Disconnect {
        /// The connection.
        connection_id: ConnectionId,
    },
    /// The session manager's answer to a logon or re-activation: the offline
    /// record of the session, if one was held.
    ReclaimOfflineSession {
        /// The new connection of the session.
        connection_id: ConnectionId,
        /// The offline record.
        offline: Option<Box<GatewaySession>>,
    },
    /// A session changed owner.
    LibraryChanged {
        /// The session.
        session_id: SessionId,
        /// Its new owner.
        library_id: LibraryId,
    },
}

/// Commands consumed by the receiver unit.
#[derive(Debug)]
pub enum ReceiverCommand {
    /// Start reading a connection.
    NewConnection {
        /// Read half of the connection.
        endpoint: ReceiverEndPoint,
        /// Role of the connection.
        connection_type: ConnectionType,
        /// Known session id, `SessionId::UNKNOWN` for acceptors.
        session_id: SessionId,
    },
    /// Stop reading a connection and close it.
    RemoveConnection {
        /// The connection.
        connection_id: ConnectionId,
    },
}

/// Commands consumed by the session manager unit.
#[derive(Debug)]
pub enum SessionManagerCommand {
    /// An acceptor received a valid Logon and waits for the offline record
    /// before replying.
    SessionLogon {
        /// The session named by the Logon.
        session_id: SessionId,
        /// The connection it arrived on.
        connection_id: ConnectionId,
    },
    /// A session completed logon.
    SessionActive {
        /// The session.
        session_id: SessionId,
        /// Its connection.
        connection_id: ConnectionId,
        /// Its role.
        connection_type: ConnectionType,
        /// Its owner.
        library_id: LibraryId,
    },
    /// An active session lost its connection.
    SessionOffline {
        /// The disconnected session record.
        session: Box<GatewaySession>,
    },
    /// Move a session to another library.
    TransferOwnership {
        /// The session.
        session_id: SessionId,
        /// The new owner.
        library_id: LibraryId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_drain_is_fifo() {
        let (producer, mut queue) = command_queue::<u32>("test", 8);
        for i in 0..5 {
            producer.enqueue(i).unwrap();
        }
        let mut seen = Vec::new();
        assert_eq!(queue.drain(|c| seen.push(c)), 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.drain(|c| seen.push(c)), 0);
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_enqueue_full_returns_command() {
        let (producer, mut queue) = command_queue::<&str>("test", 2);
        producer.enqueue("a").unwrap();
        producer.enqueue("b").unwrap();
        assert_eq!(producer.enqueue("c"), Err(QueueFull("c")));
        assert_eq!(producer.len(), 2);

        queue.drain(|_| {});
        assert!(producer.is_empty());
        producer.enqueue("c").unwrap();
    }

    #[test]
    fn test_cloned_producers_share_queue() {
        let (first, mut queue) = command_queue::<u32>("test", 8);
        let second = first.clone();
        first.enqueue(1).unwrap();
        second.enqueue(2).unwrap();
        first.enqueue(3).unwrap();

        let mut seen = Vec::new();
        queue.drain(|c| seen.push(c));
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(second.name(), "test");
    }

    #[test]
    fn test_drain_does_not_chase_new_commands() {
        let (producer, mut queue) = command_queue::<u32>("test", 8);
        producer.enqueue(1).unwrap();
        let inner = producer.clone();
        let executed = queue.drain(|c| {
            if c == 1 {
                inner.enqueue(2).unwrap();
            }
        });
        assert_eq!(executed, 1);
        assert_eq!(producer.len(), 1);
    }

    #[test]
    fn test_offer_until_gives_up_at_deadline() {
        let (producer, _queue) = command_queue::<u32>("test", 1);
        producer.enqueue(1).unwrap();
        let start = Instant::now();
        let result = producer.offer_until(2, start + Duration::from_millis(20));
        assert_eq!(result.map_err(QueueFull::into_inner), Err(2));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_concurrent_producer_order_preserved() {
        let (producer, mut queue) = command_queue::<u32>("test", 4);
        let worker = std::thread::spawn(move || {
            for i in 0..100 {
                producer
                    .offer_until(i, Instant::now() + Duration::from_secs(5))
                    .unwrap();
            }
        });
        let mut seen = Vec::new();
        while seen.len() < 100 {
            queue.drain(|c| seen.push(c));
        }
        worker.join().unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
