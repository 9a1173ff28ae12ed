/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! # Fixwire Transport
//!
//! Transport framing for the fixwire FIX session engine.
//!
//! This crate provides:
//! - **Codec**: Tokio codec splitting byte streams into whole FIX frames,
//!   with BeginString/BodyLength/Checksum validation

pub mod codec;

pub use codec::{CodecError, FixCodec};
