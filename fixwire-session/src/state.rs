/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Session state and role.
//!
//! The session lifecycle is a runtime state machine: the next state depends
//! on wire input, so transitions are data, not types. The orthogonal
//! flags (outstanding test request, logon grace expired) live on the
//! session itself.

use std::fmt;

/// Which side of the session this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Actively opens the session and sends the first Logon.
    Initiator,
    /// Passively accepts the session and answers the Logon.
    Acceptor,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => write!(f, "initiator"),
            Self::Acceptor => write!(f, "acceptor"),
        }
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// Transport up, pre-logon.
    Connected,
    /// Initiator: Logon sent, awaiting the reply.
    LogonSent,
    /// Acceptor: Logon received, awaiting the application's decision.
    LogonReceived,
    /// Session established.
    Authenticated,
    /// Gap detected; awaiting backfill from the peer.
    Resync,
    /// Logout sent, awaiting confirmation.
    LogoutSent,
    /// Logout received from the peer.
    LogoutReceived,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Returns true once the session can never leave this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true while the session is logged on (including resync,
    /// which is an authenticated sub-mode).
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Authenticated | Self::Resync)
    }

    /// Returns true if application messages may be sent.
    #[must_use]
    pub const fn can_send_app(self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Short name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::LogonSent => "logon-sent",
            Self::LogonReceived => "logon-received",
            Self::Authenticated => "authenticated",
            Self::Resync => "resync",
            Self::LogoutSent => "logout-sent",
            Self::LogoutReceived => "logout-received",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
