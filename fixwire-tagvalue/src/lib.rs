/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! # Fixwire TagValue
//!
//! Zero-copy tag=value encoding and decoding for the fixwire engine.
//!
//! This crate provides:
//! - **Checksum**: FIX checksum calculation and validation
//! - **Decoder**: Zero-copy message parsing
//! - **Encoder**: Message building with automatic BodyLength/Checksum

pub mod checksum;
pub mod decoder;
pub mod encoder;

pub use checksum::{calculate_checksum, format_checksum, parse_checksum};
pub use decoder::Decoder;
pub use encoder::{Encoder, SOH};
