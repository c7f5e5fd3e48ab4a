/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The gateway orchestrator.
//!
//! Builds the replicated streams, the command queues and the three units,
//! runs each unit on its own thread and offers a blocking `initiate` to
//! caller threads.

use crate::agent::{Agent, AgentRunner};
use crate::command::{CommandProducer, SessionManagerCommand, command_queue};
use crate::config::GatewayConfig;
use crate::handle::SessionHandle;
use crate::multiplexer::Multiplexer;
use crate::proxy::{ReceiverProxy, SenderProxy, SessionManagerProxy};
use crate::receiver::Receiver;
use crate::rendezvous::{InitiateOutcome, InitiateRendezvous};
use crate::sender::{Sender, SenderLinks, SenderSettings};
use crate::session_manager::{ControlLog, SessionManager};
use crate::session_proxy::FramingSessionProxy;
use fixgate_core::error::{GatewayError, Result, TransportError};
use fixgate_core::types::{LibraryId, SessionId};
use fixgate_replication::in_process::InProcessTransport;
use fixgate_replication::streams::ReplicationStreams;
use fixgate_replication::transport::ReplicationTransport;
use fixgate_session::config::SessionConfig;
use parking_lot::Mutex;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug)]
struct Runners {
    sender: AgentRunner<Sender>,
    receiver: AgentRunner<Receiver>,
    session_manager: AgentRunner<SessionManager>,
}

/// A running gateway.
///
/// Dropping the gateway closes it.
#[derive(Debug)]
pub struct FixGateway {
    initiator: Mutex<SenderProxy>,
    session_manager: CommandProducer<SessionManagerCommand>,
    rendezvous: Arc<InitiateRendezvous>,
    streams: ReplicationStreams,
    transport: InProcessTransport,
    runners: Option<Runners>,
    connection_timeout: Duration,
    connection_timeout_ms: u64,
    close_grace: Duration,
    library_id: LibraryId,
    local_addr: Option<SocketAddr>,
}

impl FixGateway {
    /// Builds and starts a gateway.
    ///
    /// # Errors
    /// Returns an error if the transport cannot be constructed, the listener
    /// cannot be bound or a unit thread cannot be started. Nothing keeps
    /// running after an error.
    pub fn launch(config: GatewayConfig) -> Result<Self> {
        let authentication_timeout_ms = config.authentication_timeout_ms();
        let connection_timeout_ms = config.connection_timeout_ms();
        let GatewayConfig {
            bind_address,
            connection_timeout,
            encoder_buffer_size,
            receiver_buffer_size,
            default_heartbeat_interval,
            session_id_strategy,
            command_queue_capacity,
            idle,
            close_grace,
            stream_capacity,
            inbound_handler,
            library_id,
            clock,
            ..
        } = config;

        let transport = InProcessTransport::new(stream_capacity)?;
        let mut streams = ReplicationStreams::open(&transport)?;
        let listener = bind_address.as_deref().map(TcpListener::bind).transpose()?;
        let local_addr = listener.as_ref().map(TcpListener::local_addr).transpose()?;

        let (sender_producer, sender_queue) = command_queue("sender", command_queue_capacity);
        let (receiver_producer, receiver_queue) =
            command_queue("receiver", command_queue_capacity);
        let (manager_producer, manager_queue) =
            command_queue("session-manager", command_queue_capacity);
        let rendezvous = Arc::new(InitiateRendezvous::new());

        let data = streams
            .subscribe_data(Multiplexer::new())
            .ok_or_else(|| subscription_taken("data"))?;
        let control = streams
            .subscribe_control(ControlLog::new())
            .ok_or_else(|| subscription_taken("control"))?;

        let sender = Sender::new(
            sender_queue,
            SenderLinks {
                data,
                data_publication: streams.data_publication(),
                session_proxy: Box::new(FramingSessionProxy::new(
                    encoder_buffer_size,
                    streams.data_publication(),
                )),
                own_queue: sender_producer.clone(),
                receiver: ReceiverProxy::new(receiver_producer),
                session_manager: SessionManagerProxy::new(manager_producer.clone()),
                rendezvous: Arc::clone(&rendezvous),
            },
            Arc::clone(&session_id_strategy),
            clock,
            SenderSettings {
                authentication_timeout_ms,
                connect_timeout: connection_timeout,
                receiver_buffer_size,
                default_heartbeat_secs: default_heartbeat_interval.as_secs(),
                library_id,
            },
        );
        let receiver = Receiver::new(
            receiver_queue,
            listener,
            SenderProxy::new(sender_producer.clone()),
            inbound_handler,
            session_id_strategy,
        )?;
        let session_manager = SessionManager::new(
            manager_queue,
            SenderProxy::new(sender_producer.clone()),
            streams.control_publication(),
            control,
        );

        let abort = |transport: &InProcessTransport, streams: &ReplicationStreams| {
            streams.close();
            transport.close();
        };
        let sender = match AgentRunner::start(sender, idle) {
            Ok(runner) => runner,
            Err(e) => {
                abort(&transport, &streams);
                return Err(e.into());
            }
        };
        let receiver = match AgentRunner::start(receiver, idle) {
            Ok(runner) => runner,
            Err(e) => {
                stop(sender, close_grace);
                abort(&transport, &streams);
                return Err(e.into());
            }
        };
        let session_manager_runner = match AgentRunner::start(session_manager, idle) {
            Ok(runner) => runner,
            Err(e) => {
                stop(sender, close_grace);
                stop(receiver, close_grace);
                abort(&transport, &streams);
                return Err(e.into());
            }
        };

        info!(
            bind_address = ?local_addr,
            %library_id,
            connection_timeout_ms,
            "gateway launched"
        );
        Ok(Self {
            initiator: Mutex::new(SenderProxy::new(sender_producer)),
            session_manager: manager_producer,
            rendezvous,
            streams,
            transport,
            runners: Some(Runners {
                sender,
                receiver,
                session_manager: session_manager_runner,
            }),
            connection_timeout,
            connection_timeout_ms,
            close_grace,
            library_id,
            local_addr,
        })
    }

    /// Connects out and blocks until the session has logged on.
    ///
    /// Calls are serialized: a second caller waits for the first to finish
    /// before its own timeout starts.
    ///
    /// # Errors
    /// * `GatewayError::ConnectionTimeout` if the session is not active
    ///   within the connection timeout
    /// * `GatewayError::ConnectionFailed` if the connect attempt fails early
    /// * `GatewayError::QueueFull` if the sender does not accept the request
    pub fn initiate(&self, config: SessionConfig) -> Result<SessionHandle> {
        let initiator = self.initiator.lock();
        let deadline = Instant::now() + self.connection_timeout;
        let address = config.address();

        let correlation_id = self.rendezvous.arm();
        if let Err(e) =
            initiator.connect_until(correlation_id, self.library_id, config, deadline)
        {
            self.rendezvous.disarm(correlation_id);
            return Err(e);
        }
        match self.rendezvous.await_outcome(correlation_id, deadline) {
            Some(InitiateOutcome::Active(handle)) => {
                info!(%address, session_id = %handle.session_id(), "session initiated");
                Ok(handle)
            }
            Some(InitiateOutcome::Failed(reason)) => {
                warn!(%address, %reason, "initiate failed");
                Err(GatewayError::ConnectionFailed { address, reason })
            }
            None => {
                let timeout_ms = self.connection_timeout_ms;
                warn!(%address, timeout_ms, "initiate timed out");
                Err(GatewayError::ConnectionTimeout {
                    address,
                    timeout_ms,
                })
            }
        }
    }

    /// Moves a session to another library.
    ///
    /// # Errors
    /// Returns `GatewayError::QueueFull` if the session manager queue is full.
    pub fn transfer_ownership(&self, session_id: SessionId, library_id: LibraryId) -> Result<()> {
        self.session_manager
            .enqueue(SessionManagerCommand::TransferOwnership {
                session_id,
                library_id,
            })
            .map_err(|_| GatewayError::QueueFull {
                queue: self.session_manager.name(),
            })
    }

    /// Returns the address the listener is bound to, if accepting.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the library new sessions are assigned to.
    #[must_use]
    pub const fn library_id(&self) -> LibraryId {
        self.library_id
    }

    /// Stops every unit and releases the streams.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(runners) = self.runners.take() else {
            return;
        };
        stop(runners.sender, self.close_grace);
        stop(runners.receiver, self.close_grace);
        stop(runners.session_manager, self.close_grace);
        self.streams.close();
        self.transport.close();
        info!("gateway closed");
    }
}

impl Drop for FixGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stop<A: Agent>(runner: AgentRunner<A>, grace: Duration) {
    if let Some(mut agent) = runner.close(grace) {
        agent.on_close();
    }
}

fn subscription_taken(channel: &str) -> GatewayError {
    GatewayError::Transport(TransportError::Construction(format!(
        "{channel} subscription already taken"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_gateway_is_shareable_across_threads() {
        assert_send_sync::<FixGateway>();
        assert_send_sync::<Arc<FixGateway>>();
    }

    #[test]
    fn test_launch_and_close_without_listener() {
        let gateway = FixGateway::launch(GatewayConfig::default()).unwrap();
        assert!(gateway.local_addr().is_none());
        assert_eq!(gateway.library_id(), LibraryId::ENGINE);
        gateway.close();
    }
}
