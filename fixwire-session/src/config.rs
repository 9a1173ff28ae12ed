/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Session configuration.

use fixwire_core::types::{CompId, SessionId};
use std::time::Duration;

/// Configuration for a FIX session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local SenderCompID (tag 49).
    pub sender_comp_id: CompId,
    /// Peer TargetCompID (tag 56).
    pub target_comp_id: CompId,
    /// FIX version BeginString (e.g., "FIX.4.4").
    pub begin_string: String,
    /// Heartbeat interval; advertised as HeartBtInt on logon.
    pub heartbeat_interval: Duration,
    /// Multiple of the heartbeat interval of inbound silence before a
    /// TestRequest is sent.
    pub test_request_factor: f64,
    /// Multiple of the heartbeat interval to wait for the TestRequest
    /// answer before declaring the peer dead.
    pub dead_peer_factor: f64,
    /// Max time to complete the logon handshake.
    pub logon_timeout: Duration,
    /// Grace period for the logout handshake on local shutdown.
    pub logout_timeout: Duration,
    /// Tolerance for inbound SendingTime vs the local clock.
    pub sending_time_accuracy: Duration,
    /// Whether to reset sequence numbers on logon.
    pub reset_on_logon: bool,
    /// Maximum message size in bytes.
    pub max_message_size: usize,
    /// Whether to validate incoming message checksums.
    pub validate_checksum: bool,
}

impl SessionConfig {
    /// Creates a new session configuration with required fields and
    /// defaults for the rest.
    #[must_use]
    pub fn new(
        sender_comp_id: CompId,
        target_comp_id: CompId,
        begin_string: impl Into<String>,
    ) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
            begin_string: begin_string.into(),
            heartbeat_interval: Duration::from_secs(30),
            test_request_factor: 1.2,
            dead_peer_factor: 0.5,
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(10),
            sending_time_accuracy: Duration::from_secs(120),
            reset_on_logon: false,
            max_message_size: 1024 * 1024, // 1MB
            validate_checksum: true,
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the logon timeout.
    #[must_use]
    pub fn with_logon_timeout(mut self, timeout: Duration) -> Self {
        self.logon_timeout = timeout;
        self
    }

    /// Sets the logout grace period.
    #[must_use]
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Sets the SendingTime accuracy window.
    #[must_use]
    pub fn with_sending_time_accuracy(mut self, window: Duration) -> Self {
        self.sending_time_accuracy = window;
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Returns the session identity triple.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId {
            begin_string: self.begin_string.clone(),
            sender_comp_id: self.sender_comp_id.clone(),
            target_comp_id: self.target_comp_id.clone(),
        }
    }

    /// Returns the heartbeat interval in whole seconds, as carried in
    /// HeartBtInt (tag 108).
    #[must_use]
    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.heartbeat_interval.as_secs()
    }

    /// Inbound-silence window before a TestRequest goes out.
    #[must_use]
    pub fn test_request_timeout(&self) -> Duration {
        self.heartbeat_interval.mul_f64(self.test_request_factor)
    }

    /// Window after a TestRequest before the peer is declared dead.
    #[must_use]
    pub fn dead_peer_timeout(&self) -> Duration {
        self.heartbeat_interval.mul_f64(self.dead_peer_factor)
    }
}
