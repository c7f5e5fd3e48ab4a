/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The receiver unit.
//!
//! Owns the optional listening socket and the inbound half of every
//! connection. Accepted sockets and session-level events are forwarded to the
//! sender; every frame goes to the configured [`InboundHandler`].

use crate::agent::Agent;
use crate::command::{CommandQueue, ReceiverCommand};
use crate::handler::InboundHandler;
use crate::proxy::SenderProxy;
use bytes::Bytes;
use fixgate_core::types::{ConnectionId, ConnectionType, SessionId};
use fixgate_session::state::DisconnectReason;
use fixgate_session::strategy::{CompositeKey, SessionIdStrategy};
use fixgate_transport::endpoint::{EndpointError, ReceiverEndPoint};
use fixgate_transport::frame::{FrameHeader, MsgKind};
use std::collections::HashMap;
use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connections accepted per tick.
const ACCEPT_LIMIT: usize = 16;

#[derive(Debug)]
struct Inbound {
    endpoint: ReceiverEndPoint,
    session_id: SessionId,
    connection_type: ConnectionType,
}

/// The receiver unit.
#[derive(Debug)]
pub struct Receiver {
    commands: CommandQueue<ReceiverCommand>,
    state: ReceiverState,
}

#[derive(Debug)]
struct ReceiverState {
    listener: Option<TcpListener>,
    endpoints: HashMap<ConnectionId, Inbound>,
    sender: SenderProxy,
    handler: Box<dyn InboundHandler>,
    strategy: Arc<dyn SessionIdStrategy>,
}

impl Receiver {
    /// Creates the receiver unit.
    ///
    /// # Arguments
    /// * `commands` - The receiver command queue
    /// * `listener` - Bound listener, if accepting
    /// * `sender` - Commands to the sender
    /// * `handler` - Callback for inbound frames
    /// * `strategy` - Maps identity fields to session ids
    ///
    /// # Errors
    /// Returns an error if the listener cannot be made non-blocking.
    pub fn new(
        commands: CommandQueue<ReceiverCommand>,
        listener: Option<TcpListener>,
        sender: SenderProxy,
        handler: Box<dyn InboundHandler>,
        strategy: Arc<dyn SessionIdStrategy>,
    ) -> io::Result<Self> {
        if let Some(listener) = &listener {
            listener.set_nonblocking(true)?;
        }
        Ok(Self {
            commands,
            state: ReceiverState {
                listener,
                endpoints: HashMap::new(),
                sender,
                handler,
                strategy,
            },
        })
    }

    /// Returns the number of connections being read.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.endpoints.len()
    }
}

impl Agent for Receiver {
    fn role_name(&self) -> &'static str {
        "receiver"
    }

    fn do_work(&mut self) -> usize {
        let state = &mut self.state;
        let mut work = state.sender.flush();
        work += self.commands.drain(|command| state.on_command(command));
        work += state.accept();
        work += state.poll_endpoints();
        work
    }

    fn on_close(&mut self) {
        let state = &mut self.state;
        state.listener = None;
        for (_, inbound) in state.endpoints.drain() {
            inbound.endpoint.close();
        }
        state.sender.flush();
        info!("receiver closed");
    }
}

impl ReceiverState {
    fn on_command(&mut self, command: ReceiverCommand) {
        match command {
            ReceiverCommand::NewConnection {
                endpoint,
                connection_type,
                session_id,
            } => {
                let connection_id = endpoint.connection_id();
                debug!(%connection_id, %connection_type, "reading connection");
                self.endpoints.insert(
                    connection_id,
                    Inbound {
                        endpoint,
                        session_id,
                        connection_type,
                    },
                );
            }
            ReceiverCommand::RemoveConnection { connection_id } => {
                if let Some(inbound) = self.endpoints.remove(&connection_id) {
                    inbound.endpoint.close();
                    debug!(%connection_id, "connection removed");
                }
            }
        }
    }

    fn accept(&mut self) -> usize {
        let Some(listener) = &self.listener else {
            return 0;
        };
        let mut accepted = 0;
        while accepted < ACCEPT_LIMIT {
            match listener.accept() {
                Ok((stream, address)) => {
                    debug!(%address, "accepted");
                    self.sender.new_accepted_connection(stream, address);
                    accepted += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
        accepted
    }

    fn poll_endpoints(&mut self) -> usize {
        let mut work = 0;
        let mut ended = Vec::new();
        for (&connection_id, inbound) in &mut self.endpoints {
            let connection_type = inbound.connection_type;
            let session_id = &mut inbound.session_id;
            let sender = &mut self.sender;
            let handler = &mut self.handler;
            let strategy = &self.strategy;
            let mut protocol_error = false;

            let result = inbound.endpoint.poll(|frame: Bytes| {
                let header = match FrameHeader::parse(&frame) {
                    Ok(header) => header,
                    Err(e) => {
                        warn!(%connection_id, error = %e, "unparseable frame");
                        protocol_error = true;
                        return;
                    }
                };
                match header.msg_kind {
                    MsgKind::Logon => match (header.sender_comp_id, header.target_comp_id) {
                        (Some(remote), Some(local)) => {
                            let key = CompositeKey::new(local, remote);
                            if connection_type == ConnectionType::Acceptor
                                && !session_id.is_known()
                            {
                                *session_id = strategy.session_id(&key);
                            }
                            sender.logon_received(
                                connection_id,
                                key,
                                header.begin_string,
                                header.msg_seq_num.unwrap_or_default(),
                                header.heartbeat_interval_secs,
                            );
                        }
                        _ => {
                            warn!(%connection_id, "logon without comp ids");
                            protocol_error = true;
                        }
                    },
                    MsgKind::Logout => {
                        sender.connection_closed(connection_id, DisconnectReason::Logout);
                    }
                    MsgKind::Heartbeat | MsgKind::Other => {}
                }
                handler.on_message(*session_id, connection_id, &frame);
            });

            let reason = match result {
                Ok(frames) => {
                    work += frames;
                    protocol_error.then_some(DisconnectReason::ProtocolError)
                }
                Err(EndpointError::PeerClosed) => Some(DisconnectReason::PeerClosed),
                Err(EndpointError::Codec(e)) => {
                    warn!(%connection_id, error = %e, "framing error");
                    Some(DisconnectReason::ProtocolError)
                }
                Err(e) => {
                    warn!(%connection_id, error = %e, "read failed");
                    Some(DisconnectReason::IoError)
                }
            };
            if let Some(reason) = reason {
                ended.push((connection_id, reason));
            }
        }

        for (connection_id, reason) in ended {
            if let Some(inbound) = self.endpoints.remove(&connection_id) {
                inbound.endpoint.close();
                self.handler
                    .on_disconnect(inbound.session_id, connection_id, reason);
            }
            self.sender.connection_closed(connection_id, reason);
            work += 1;
        }
        work
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{SenderCommand, command_queue};
    use crate::handler::{ForwardingHandler, InboundMessage};
    use fixgate_core::types::SeqNum;
    use fixgate_session::strategy::SenderTargetStrategy;
    use fixgate_transport::endpoint::split_stream;
    use fixgate_transport::frame::{AdminEncoder, HeaderFields};
    use std::io::Write;
    use std::net::TcpStream;
    use std::time::{Duration, Instant};

    struct Fixture {
        receiver: Receiver,
        producer: crate::command::CommandProducer<ReceiverCommand>,
        sender_queue: CommandQueue<SenderCommand>,
        inbound: crossbeam_channel::Receiver<InboundMessage>,
    }

    fn fixture(listener: Option<TcpListener>) -> Fixture {
        let (producer, commands) = command_queue("receiver", 16);
        let (sender_producer, sender_queue) = command_queue("sender", 16);
        let (tx, inbound) = crossbeam_channel::unbounded();
        let receiver = Receiver::new(
            commands,
            listener,
            SenderProxy::new(sender_producer),
            Box::new(ForwardingHandler::new(tx)),
            Arc::new(SenderTargetStrategy::new()),
        )
        .unwrap();
        Fixture {
            receiver,
            producer,
            sender_queue,
            inbound,
        }
    }

    fn attach(fx: &mut Fixture, connection_type: ConnectionType) -> (ConnectionId, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        let connection_id = ConnectionId::new(7);
        let (endpoint, _sender) = split_stream(server, connection_id, 1024).unwrap();
        fx.producer
            .enqueue(ReceiverCommand::NewConnection {
                endpoint,
                connection_type,
                session_id: SessionId::UNKNOWN,
            })
            .unwrap();
        fx.receiver.do_work();
        assert_eq!(fx.receiver.connection_count(), 1);
        (connection_id, client)
    }

    fn logon_from(sender: &str, target: &str) -> Bytes {
        AdminEncoder::new(256).logon(
            &HeaderFields {
                begin_string: "FIX.4.4",
                sender_comp_id: sender,
                target_comp_id: target,
                msg_seq_num: SeqNum::new(3),
                sending_time_ms: 0,
            },
            30,
            false,
        )
    }

    fn drain_until<F>(fx: &mut Fixture, mut done: F) -> Vec<SenderCommand>
    where
        F: FnMut(&[SenderCommand]) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = Vec::new();
        while !done(&seen) && Instant::now() < deadline {
            fx.receiver.do_work();
            fx.sender_queue.drain(|c| seen.push(c));
            std::thread::sleep(Duration::from_millis(1));
        }
        seen
    }

    #[test]
    fn test_logon_is_reported_with_local_view_key() {
        let mut fx = fixture(None);
        let (connection_id, mut client) = attach(&mut fx, ConnectionType::Acceptor);
        client.write_all(&logon_from("CLIENT", "GW")).unwrap();

        let seen = drain_until(&mut fx, |seen| !seen.is_empty());
        match seen.as_slice() {
            [SenderCommand::LogonReceived { connection_id: id, key, msg_seq_num, heartbeat_interval_secs, begin_string }] => {
                assert_eq!(*id, connection_id);
                assert_eq!(key.local_comp_id.as_str(), "GW");
                assert_eq!(key.remote_comp_id.as_str(), "CLIENT");
                assert_eq!(*msg_seq_num, SeqNum::new(3));
                assert_eq!(*heartbeat_interval_secs, Some(30));
                assert_eq!(begin_string.as_deref(), Some("FIX.4.4"));
            }
            other => panic!("unexpected sender commands: {other:?}"),
        }

        let message = fx.inbound.try_recv().unwrap();
        let expected = SenderTargetStrategy::new()
            .session_id(&CompositeKey::new("GW".parse().unwrap(), "CLIENT".parse().unwrap()));
        assert_eq!(message.session_id, expected);
        assert_eq!(message.connection_id, connection_id);
    }

    #[test]
    fn test_peer_close_reports_connection_closed() {
        let mut fx = fixture(None);
        let (connection_id, client) = attach(&mut fx, ConnectionType::Initiator);
        drop(client);

        let seen = drain_until(&mut fx, |seen| !seen.is_empty());
        assert!(matches!(
            seen.as_slice(),
            [SenderCommand::ConnectionClosed { connection_id: id, reason: DisconnectReason::PeerClosed }]
                if *id == connection_id
        ));
        assert_eq!(fx.receiver.connection_count(), 0);
    }

    #[test]
    fn test_garbage_is_a_protocol_error() {
        let mut fx = fixture(None);
        let (connection_id, mut client) = attach(&mut fx, ConnectionType::Acceptor);
        client.write_all(b"HELLO WORLD\x01").unwrap();

        let seen = drain_until(&mut fx, |seen| !seen.is_empty());
        assert!(matches!(
            seen.as_slice(),
            [SenderCommand::ConnectionClosed { connection_id: id, reason: DisconnectReason::ProtocolError }]
                if *id == connection_id
        ));
    }

    #[test]
    fn test_listener_forwards_accepted_sockets() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let mut fx = fixture(Some(listener));
        let _client = TcpStream::connect(address).unwrap();

        let seen = drain_until(&mut fx, |seen| !seen.is_empty());
        assert!(matches!(
            seen.as_slice(),
            [SenderCommand::NewAcceptedConnection { .. }]
        ));
    }

    #[test]
    fn test_remove_connection_closes_socket() {
        let mut fx = fixture(None);
        let (connection_id, mut client) = attach(&mut fx, ConnectionType::Acceptor);
        fx.producer
            .enqueue(ReceiverCommand::RemoveConnection { connection_id })
            .unwrap();
        fx.receiver.do_work();
        assert_eq!(fx.receiver.connection_count(), 0);

        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(std::io::Read::read(&mut client, &mut buf).unwrap(), 0);
    }
}
