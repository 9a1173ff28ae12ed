/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! # Fixwire Dictionary
//!
//! FIX protocol dictionary schema and loading for the fixwire engine.
//!
//! This crate provides:
//! - **Schema**: Field, message, header and trailer definitions
//! - **Loader**: YAML dictionary files resolved into a [`Dictionary`]
//!
//! The session layer uses the dictionary only for validation; the session
//! protocol itself operates on the well-known header and admin shapes.

pub mod loader;
pub mod schema;

pub use loader::{LoaderError, from_yaml_file, from_yaml_str};
pub use schema::{
    Dictionary, FieldDef, FieldType, GroupDef, MemberRef, MessageCategory, MessageDef, Version,
};
