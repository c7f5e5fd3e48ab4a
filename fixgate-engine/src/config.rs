/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Gateway configuration.
//!
//! This module provides a builder API for configuring the gateway.

use crate::command::DEFAULT_QUEUE_CAPACITY;
use crate::handler::{InboundHandler, LoggingHandler};
use crate::idle::IdleConfig;
use fixgate_core::clock::{Clock, SystemClock};
use fixgate_core::error::{GatewayError, Result};
use fixgate_core::types::LibraryId;
use fixgate_replication::in_process::DEFAULT_STREAM_CAPACITY;
use fixgate_session::strategy::{SenderTargetStrategy, SessionIdStrategy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default encoder buffer size in bytes.
pub const DEFAULT_ENCODER_BUFFER_SIZE: usize = 8 * 1024;

/// Default receive buffer size in bytes.
pub const DEFAULT_RECEIVER_BUFFER_SIZE: usize = 16 * 1024;

/// Configuration of a gateway instance.
pub struct GatewayConfig {
    /// Address to accept connections on. `None` disables accepting.
    pub bind_address: Option<String>,
    /// Time `initiate` waits for a session to become active.
    pub connection_timeout: Duration,
    /// Time a connection is given to complete logon.
    pub authentication_timeout: Duration,
    /// Initial capacity of the admin message encoder.
    pub encoder_buffer_size: usize,
    /// Bytes read per socket read.
    pub receiver_buffer_size: usize,
    /// HeartBtInt used when replying to a Logon that carries none.
    pub default_heartbeat_interval: Duration,
    /// Maps identity fields to session ids.
    pub session_id_strategy: Arc<dyn SessionIdStrategy>,
    /// Capacity of each unit's command queue.
    pub command_queue_capacity: usize,
    /// Idle strategy of every runner.
    pub idle: IdleConfig,
    /// Time each runner is given to stop on close.
    pub close_grace: Duration,
    /// Per-subscription buffer of the replicated streams.
    pub stream_capacity: usize,
    /// Callback for inbound frames.
    pub inbound_handler: Box<dyn InboundHandler>,
    /// Library that owns sessions created by this gateway.
    pub library_id: LibraryId,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl GatewayConfig {
    /// Returns a builder with default settings.
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// Returns the authentication timeout in milliseconds.
    #[must_use]
    pub fn authentication_timeout_ms(&self) -> u64 {
        duration_ms(self.authentication_timeout)
    }

    /// Returns the connection timeout in milliseconds.
    #[must_use]
    pub fn connection_timeout_ms(&self) -> u64 {
        duration_ms(self.connection_timeout)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            connection_timeout: Duration::from_secs(5),
            authentication_timeout: Duration::from_secs(5),
            encoder_buffer_size: DEFAULT_ENCODER_BUFFER_SIZE,
            receiver_buffer_size: DEFAULT_RECEIVER_BUFFER_SIZE,
            default_heartbeat_interval: Duration::from_secs(10),
            session_id_strategy: Arc::new(SenderTargetStrategy::new()),
            command_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle: IdleConfig::default(),
            close_grace: Duration::from_secs(1),
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            inbound_handler: Box::new(LoggingHandler),
            library_id: LibraryId::ENGINE,
            clock: Arc::new(SystemClock::new()),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_address", &self.bind_address)
            .field("connection_timeout", &self.connection_timeout)
            .field("authentication_timeout", &self.authentication_timeout)
            .field("encoder_buffer_size", &self.encoder_buffer_size)
            .field("receiver_buffer_size", &self.receiver_buffer_size)
            .field("default_heartbeat_interval", &self.default_heartbeat_interval)
            .field("session_id_strategy", &self.session_id_strategy)
            .field("command_queue_capacity", &self.command_queue_capacity)
            .field("idle", &self.idle)
            .field("close_grace", &self.close_grace)
            .field("stream_capacity", &self.stream_capacity)
            .field("inbound_handler", &self.inbound_handler)
            .field("library_id", &self.library_id)
            .finish_non_exhaustive()
    }
}

/// Builder for [`GatewayConfig`].
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts connections on `address`.
    #[must_use]
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.config.bind_address = Some(address.into());
        self
    }

    /// Sets the time `initiate` waits for activation.
    #[must_use]
    pub const fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Sets the time allowed for logon.
    #[must_use]
    pub const fn with_authentication_timeout(mut self, timeout: Duration) -> Self {
        self.config.authentication_timeout = timeout;
        self
    }

    /// Sets the encoder buffer size.
    #[must_use]
    pub const fn with_encoder_buffer_size(mut self, size: usize) -> Self {
        self.config.encoder_buffer_size = size;
        self
    }

    /// Sets the receive buffer size.
    #[must_use]
    pub const fn with_receiver_buffer_size(mut self, size: usize) -> Self {
        self.config.receiver_buffer_size = size;
        self
    }

    /// Sets the fallback heartbeat interval.
    #[must_use]
    pub const fn with_default_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.default_heartbeat_interval = interval;
        self
    }

    /// Sets the session id strategy.
    #[must_use]
    pub fn with_session_id_strategy(mut self, strategy: Arc<dyn SessionIdStrategy>) -> Self {
        self.config.session_id_strategy = strategy;
        self
    }

    /// Sets the command queue capacity.
    #[must_use]
    pub const fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.command_queue_capacity = capacity;
        self
    }

    /// Sets the idle strategy.
    #[must_use]
    pub const fn with_idle(mut self, idle: IdleConfig) -> Self {
        self.config.idle = idle;
        self
    }

    /// Sets the runner close grace period.
    #[must_use]
    pub const fn with_close_grace(mut self, grace: Duration) -> Self {
        self.config.close_grace = grace;
        self
    }

    /// Sets the stream buffer capacity.
    #[must_use]
    pub const fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.config.stream_capacity = capacity;
        self
    }

    /// Sets the inbound handler.
    #[must_use]
    pub fn with_inbound_handler(mut self, handler: impl InboundHandler + 'static) -> Self {
        self.config.inbound_handler = Box::new(handler);
        self
    }

    /// Sets the owning library.
    #[must_use]
    pub const fn with_library_id(mut self, library_id: LibraryId) -> Self {
        self.config.library_id = library_id;
        self
    }

    /// Sets the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = clock;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    /// Returns `GatewayError::InvalidConfig` for a zero timeout, size or
    /// capacity.
    pub fn build(self) -> Result<GatewayConfig> {
        let config = self.config;
        let checks = [
            (config.connection_timeout.is_zero(), "connection timeout"),
            (config.authentication_timeout.is_zero(), "authentication timeout"),
            (config.encoder_buffer_size == 0, "encoder buffer size"),
            (config.receiver_buffer_size == 0, "receiver buffer size"),
            (config.command_queue_capacity == 0, "command queue capacity"),
            (config.stream_capacity == 0, "stream capacity"),
        ];
        if let Some((_, name)) = checks.iter().find(|(invalid, _)| *invalid) {
            return Err(GatewayError::InvalidConfig(format!(
                "{name} must be positive"
            )));
        }
        Ok(config)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
