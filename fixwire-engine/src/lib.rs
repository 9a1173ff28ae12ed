/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! # Fixwire Engine
//!
//! Endpoint runners for the fixwire FIX session engine.
//!
//! This crate provides:
//! - **Application**: Callback trait for session events and messages
//! - **Runner**: The per-session drive loop over a framed transport
//! - **Initiator / Acceptor**: TCP endpoints supervising session tasks
//! - **Builder**: Fluent assembly of an endpoint from its parts

pub mod acceptor;
pub mod application;
pub mod builder;
pub mod initiator;
pub mod runner;

pub use acceptor::Acceptor;
pub use application::{Application, LogonReject, NoOpApplication};
pub use builder::EngineBuilder;
pub use initiator::Initiator;
pub use runner::{SessionHandle, run_session};
