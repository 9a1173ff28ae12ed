/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! # Fixwire
//!
//! A FIX session layer engine for Rust, covering protocol versions 4.0
//! through 4.4.
//!
//! Fixwire implements the FIX *session protocol*: framing, sequence
//! number management, logon negotiation, heartbeat/test-request
//! keep-alive, resend-request gap recovery, sequence resets, graceful
//! logout, and persistence of session state across restarts. Message
//! *business* semantics are out of scope; application payloads flow
//! through untouched.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fixwire::prelude::*;
//! use std::sync::Arc;
//!
//! let config = SessionConfig::new(
//!     CompId::new("SENDER").unwrap(),
//!     CompId::new("TARGET").unwrap(),
//!     "FIX.4.4",
//! );
//! let store = Arc::new(MemoryStore::new());
//!
//! let initiator = EngineBuilder::new()
//!     .with_application(MyApplication)
//!     .with_session(config)
//!     .connect("127.0.0.1:9876", store)
//!     .await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types, message views, and error definitions
//! - [`dictionary`]: FIX specification schema and YAML loading
//! - [`tagvalue`]: Zero-copy tag=value encoding and decoding
//! - [`session`]: Session layer protocol state machine
//! - [`store`]: Sequence number and message persistence
//! - [`transport`]: Framing codec over byte streams
//! - [`engine`]: Endpoint runners and application callbacks

pub mod core {
    //! Core types, message views, and error definitions.
    pub use fixwire_core::*;
}

pub mod dictionary {
    //! FIX specification schema and YAML loading.
    pub use fixwire_dictionary::*;
}

pub mod tagvalue {
    //! Zero-copy tag=value encoding and decoding.
    pub use fixwire_tagvalue::*;
}

pub mod session {
    //! Session layer protocol state machine.
    pub use fixwire_session::*;
}

pub mod store {
    //! Sequence number and message persistence.
    pub use fixwire_store::*;
}

pub mod transport {
    //! Framing codec over byte streams.
    pub use fixwire_transport::*;
}

pub mod engine {
    //! Endpoint runners and application callbacks.
    pub use fixwire_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use fixwire_core::{
        CompId, DecodeError, EncodeError, FixError, FieldRef, FieldTag, FieldValue, MsgType,
        OwnedMessage, RawMessage, Result, SeqNum, SessionError, SessionHeader, SessionId,
        StoreError, Timestamp, tags,
    };

    // Dictionary
    pub use fixwire_dictionary::{Dictionary, FieldDef, FieldType, MessageDef, Version};

    // Tag-value encoding
    pub use fixwire_tagvalue::{Decoder, Encoder, calculate_checksum};

    // Session
    pub use fixwire_session::{
        AdminMessage, AppEvent, Disconnect, LogonDecision, Outcome, OutboundMessage,
        SequenceManager, Session, SessionConfig, SessionEvent, SessionRole, SessionState, TimerId,
    };

    // Store
    pub use fixwire_store::{FileSession, FileStore, MemoryStore, SessionStore};

    // Transport
    pub use fixwire_transport::{CodecError, FixCodec};

    // Engine
    pub use fixwire_engine::{
        Acceptor, Application, EngineBuilder, Initiator, LogonReject, NoOpApplication,
        SessionHandle,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _seq = SeqNum::new(1);
        let _ts = Timestamp::now();
        let _state = SessionState::Disconnected;
    }

    #[test]
    fn test_version() {
        let version = Version::Fix44;
        assert_eq!(version.begin_string(), "FIX.4.4");
    }
}
