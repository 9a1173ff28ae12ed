/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Application callback interface.
//!
//! Implement [`Application`] to receive session lifecycle events and
//! messages. Callbacks are invoked strictly in order by the session
//! runner; a send performed during a callback (through the
//! [`SessionHandle`] received in `on_create`) is interleaved with further
//! inbound processing only after the callback returns.

use crate::runner::SessionHandle;
use async_trait::async_trait;
use fixwire_core::message::OwnedMessage;
use fixwire_core::types::SessionId;

/// Refusal of an inbound logon, carried back to the peer in a Logout.
#[derive(Debug, Clone)]
pub struct LogonReject {
    /// Human-readable refusal reason (Logout tag 58).
    pub reason: String,
}

impl LogonReject {
    /// Creates a refusal with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Application callback interface for session events and messages.
#[async_trait]
pub trait Application: Send + Sync {
    /// Called once when the session task starts, before the logon
    /// handshake. The handle can be kept to send application messages and
    /// to request shutdown.
    async fn on_create(&self, session_id: &SessionId, handle: SessionHandle);

    /// Called when the session reaches the authenticated state.
    async fn on_logon(&self, session_id: &SessionId);

    /// Called when the session logs out.
    async fn on_logout(&self, session_id: &SessionId);

    /// Acceptor only: decide whether to accept an inbound logon.
    ///
    /// # Errors
    /// Return a [`LogonReject`] to refuse; a Logout carrying the reason is
    /// sent and the session closes.
    async fn on_logon_request(
        &self,
        session_id: &SessionId,
        message: &OwnedMessage,
    ) -> Result<(), LogonReject>;

    /// Called for admin messages surfaced to the application (Reject).
    async fn from_admin(&self, message: &OwnedMessage, session_id: &SessionId);

    /// Called for each accepted application message, in sequence order.
    async fn from_app(&self, message: &OwnedMessage, session_id: &SessionId);
}

/// Default no-op application implementation.
///
/// Accepts every logon and ignores every message.
#[derive(Debug, Default)]
pub struct NoOpApplication;

#[async_trait]
impl Application for NoOpApplication {
    async fn on_create(&self, _session_id: &SessionId, _handle: SessionHandle) {}

    async fn on_logon(&self, _session_id: &SessionId) {}

    async fn on_logout(&self, _session_id: &SessionId) {}

    async fn on_logon_request(
        &self,
        _session_id: &SessionId,
        _message: &OwnedMessage,
    ) -> Result<(), LogonReject> {
        Ok(())
    }

    async fn from_admin(&self, _message: &OwnedMessage, _session_id: &SessionId) {}

    async fn from_app(&self, _message: &OwnedMessage, _session_id: &SessionId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logon_reject() {
        let reject = LogonReject::new("unknown counterparty");
        assert_eq!(reject.reason, "unknown counterparty");
    }

    #[tokio::test]
    async fn test_noop_application_accepts_logon() {
        let app = NoOpApplication;
        let session_id = SessionId::new("FIX.4.4", "SENDER", "TARGET").unwrap();
        let message = OwnedMessage::new(bytes::Bytes::new(), Default::default(), vec![]);

        assert!(app.on_logon_request(&session_id, &message).await.is_ok());
        app.on_logon(&session_id).await;
        app.on_logout(&session_id).await;
    }
}
