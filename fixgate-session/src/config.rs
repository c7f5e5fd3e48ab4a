/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! Describes one outbound session: where to connect and who we are.

use crate::strategy::CompositeKey;
use fixgate_core::error::SessionError;
use fixgate_core::types::CompId;
use std::time::Duration;

/// Default FIX version.
pub const DEFAULT_BEGIN_STRING: &str = "FIX.4.4";

/// Configuration for an initiated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Remote host name or IP.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Sender CompID (tag 49).
    pub sender_comp_id: CompId,
    /// Target CompID (tag 56).
    pub target_comp_id: CompId,
    /// FIX version BeginString (e.g., "FIX.4.4").
    pub begin_string: String,
    /// Heartbeat interval sent in the Logon (tag 108).
    pub heartbeat_interval: Duration,
    /// Whether to request a sequence reset on logon (tag 141).
    pub reset_seq_num: bool,
}

impl SessionConfig {
    /// Creates a new session configuration with required fields.
    ///
    /// # Arguments
    /// * `host` - Remote host
    /// * `port` - Remote port
    /// * `sender_comp_id` - The sender CompID
    /// * `target_comp_id` - The target CompID
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        sender_comp_id: CompId,
        target_comp_id: CompId,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            sender_comp_id,
            target_comp_id,
            begin_string: DEFAULT_BEGIN_STRING.to_string(),
            heartbeat_interval: Duration::from_secs(10),
            reset_seq_num: false,
        }
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn with_reset_seq_num(mut self, reset: bool) -> Self {
        self.reset_seq_num = reset;
        self
    }

    /// Returns the `host:port` address.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the identity key of this session as seen from our side.
    #[must_use]
    pub fn session_key(&self) -> CompositeKey {
        CompositeKey::new(self.sender_comp_id.clone(), self.target_comp_id.clone())
    }

    /// Returns the heartbeat interval in seconds.
    #[must_use]
    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.heartbeat_interval.as_secs()
    }
}

/// Builder for session configuration.
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    sender_comp_id: Option<CompId>,
    target_comp_id: Option<CompId>,
    begin_string: Option<String>,
    heartbeat_interval: Option<Duration>,
    reset_seq_num: bool,
}

impl SessionConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the remote port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the sender CompID.
    #[must_use]
    pub fn sender_comp_id(mut self, id: CompId) -> Self {
        self.sender_comp_id = Some(id);
        self
    }

    /// Sets the target CompID.
    #[must_use]
    pub fn target_comp_id(mut self, id: CompId) -> Self {
        self.target_comp_id = Some(id);
        self
    }

    /// Sets the FIX version.
    #[must_use]
    pub fn begin_string(mut self, version: impl Into<String>) -> Self {
        self.begin_string = Some(version.into());
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn reset_seq_num(mut self, reset: bool) -> Self {
        self.reset_seq_num = reset;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    /// Returns `SessionError::MissingField` if host, port or either CompID
    /// is not set.
    pub fn build(self) -> Result<SessionConfig, SessionError> {
        let host = self.host.ok_or(SessionError::MissingField("host"))?;
        let port = self.port.ok_or(SessionError::MissingField("port"))?;
        let sender = self
            .sender_comp_id
            .ok_or(SessionError::MissingField("sender_comp_id"))?;
        let target = self
            .target_comp_id
            .ok_or(SessionError::MissingField("target_comp_id"))?;

        let mut config = SessionConfig::new(host, port, sender, target)
            .with_reset_seq_num(self.reset_seq_num);
        if let Some(begin_string) = self.begin_string {
            config.begin_string = begin_string;
        }
        if let Some(interval) = self.heartbeat_interval {
            config.heartbeat_interval = interval;
        }
        Ok(config)
    }
}
