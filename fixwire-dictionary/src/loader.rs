/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! YAML dictionary loading.
//!
//! A dictionary file describes one FIX version: the begin string, the field
//! table, the ordered header and trailer, and the message catalogue with
//! msgtype/msgcat and member fields:
//!
//! ```yaml
//! beginString: FIX.4.4
//! fields:
//!   MsgType: { number: 35, type: STRING }
//!   TestReqID: { number: 112, type: STRING }
//! header:
//!   - { name: SenderCompID, required: true }
//! trailer:
//!   - { name: CheckSum, required: true }
//! messages:
//!   TEST_REQUEST:
//!     msgtype: "1"
//!     msgcat: admin
//!     fields:
//!       TestReqID: { required: true }
//! ```

use crate::schema::{
    Dictionary, FieldDef, FieldType, MemberRef, MessageCategory, MessageDef, Version,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a dictionary file.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The YAML itself failed to parse.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The begin string names an unsupported version.
    #[error("unsupported begin string: {0}")]
    UnsupportedVersion(String),

    /// A header, trailer or message member names a field that is not in
    /// the field table.
    #[error("unknown field reference: {0}")]
    UnknownField(String),

    /// A message's msgcat is neither `admin` nor `app`.
    #[error("invalid msgcat for message {name}: {value}")]
    InvalidCategory {
        /// The message name.
        name: String,
        /// The offending msgcat value.
        value: String,
    },

    /// I/O error reading the file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDictionary {
    begin_string: String,
    fields: HashMap<String, RawField>,
    #[serde(default)]
    header: Vec<RawMember>,
    #[serde(default)]
    trailer: Vec<RawMember>,
    #[serde(default)]
    messages: HashMap<String, RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    number: u32,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    values: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    name: String,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    msgtype: String,
    msgcat: String,
    #[serde(default)]
    fields: HashMap<String, RawMessageMember>,
}

#[derive(Debug, Deserialize)]
struct RawMessageMember {
    #[serde(default)]
    required: bool,
}

/// Loads a dictionary from a YAML string.
///
/// # Errors
/// Returns [`LoaderError`] for malformed YAML, unsupported versions, or
/// dangling field references.
pub fn from_yaml_str(input: &str) -> Result<Dictionary, LoaderError> {
    let raw: RawDictionary = serde_yaml::from_str(input)?;

    let version = Version::from_begin_string(&raw.begin_string)
        .ok_or_else(|| LoaderError::UnsupportedVersion(raw.begin_string.clone()))?;

    let mut dict = Dictionary::new(version);

    for (name, field) in &raw.fields {
        let field_type: FieldType = field
            .field_type
            .parse()
            .unwrap_or(FieldType::String);
        let mut def = FieldDef::new(field.number, name.clone(), field_type);
        if let Some(values) = &field.values {
            def = def.with_values(values.clone());
        }
        dict.add_field(def);
    }

    let resolve = |dict: &Dictionary, name: &str, required: bool| {
        dict.get_field_by_name(name)
            .map(|def| MemberRef {
                tag: def.tag,
                name: name.to_string(),
                required,
            })
            .ok_or_else(|| LoaderError::UnknownField(name.to_string()))
    };

    for member in &raw.header {
        let resolved = resolve(&dict, &member.name, member.required)?;
        dict.header.push(resolved);
    }
    for member in &raw.trailer {
        let resolved = resolve(&dict, &member.name, member.required)?;
        dict.trailer.push(resolved);
    }

    for (name, message) in &raw.messages {
        let category = match message.msgcat.as_str() {
            "admin" => MessageCategory::Admin,
            "app" => MessageCategory::App,
            other => {
                return Err(LoaderError::InvalidCategory {
                    name: name.clone(),
                    value: other.to_string(),
                });
            }
        };

        let mut fields = Vec::with_capacity(message.fields.len());
        for (field_name, member) in &message.fields {
            fields.push(resolve(&dict, field_name, member.required)?);
        }
        fields.sort_by_key(|m| m.tag);

        dict.add_message(MessageDef {
            msg_type: message.msgtype.clone(),
            name: name.clone(),
            category,
            fields,
            groups: Vec::new(),
        });
    }

    Ok(dict)
}

/// Loads a dictionary from a YAML file on disk.
///
/// # Errors
/// Returns [`LoaderError`] if the file cannot be read or parsed.
pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Dictionary, LoaderError> {
    let input = std::fs::read_to_string(path)?;
    from_yaml_str(&input)
}
