/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! # Fixwire Session
//!
//! FIX session layer protocol implementation for the fixwire engine.
//!
//! This crate provides:
//! - **State machine**: Event-driven session FSM for initiator and acceptor
//! - **Admin handling**: Logon, heartbeat/test-request, resend, sequence
//!   reset, reject, logout
//! - **Sequence management**: Durable sequence numbers with gap recovery
//! - **Timers**: Named deadline table driving keep-alive and timeouts
//! - **Configuration**: Session configuration options

pub mod admin;
pub mod config;
pub mod resend;
pub mod sequence;
pub mod session;
pub mod state;
pub mod timers;
pub mod validate;

pub use admin::{AdminMessage, OutboundMessage};
pub use config::SessionConfig;
pub use sequence::{SequenceCheck, SequenceManager};
pub use session::{
    AppEvent, Disconnect, LogonDecision, Outcome, Session, SessionEvent,
};
pub use state::{SessionRole, SessionState};
pub use timers::{TimerId, Timers};
pub use validate::Violation;
