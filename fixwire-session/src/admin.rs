/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Admin message views and builders.
//!
//! Inbound admin messages are parsed into the [`AdminMessage`] sum type so
//! the state machine matches on shape, not on string-keyed maps.
//! Application messages stay generic and flow through to the hook.
//!
//! Outbound messages are assembled as [`OutboundMessage`] bodies; the
//! session stamps the header (sequence number, sending time) when it
//! releases them.

use crate::config::SessionConfig;
use bytes::BytesMut;
use fixwire_core::error::DecodeError;
use fixwire_core::field::{FieldValue, tags};
use fixwire_core::message::{MsgType, RawMessage};
use fixwire_core::types::Timestamp;
use fixwire_tagvalue::encoder::Encoder;

/// A parsed session-level (admin) message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMessage {
    /// Logon (A).
    Logon {
        /// EncryptMethod (tag 98); only 0 = NONE is supported.
        encrypt_method: u64,
        /// HeartBtInt (tag 108) in seconds.
        heart_bt_int: u64,
        /// ResetSeqNumFlag (tag 141).
        reset_seq_num: bool,
    },
    /// Heartbeat (0).
    Heartbeat {
        /// TestReqID (tag 112) when answering a TestRequest.
        test_req_id: Option<String>,
    },
    /// TestRequest (1).
    TestRequest {
        /// TestReqID (tag 112) to echo back.
        test_req_id: String,
    },
    /// ResendRequest (2).
    ResendRequest {
        /// BeginSeqNo (tag 7).
        begin_seq_no: u64,
        /// EndSeqNo (tag 16); 0 means "through infinity".
        end_seq_no: u64,
    },
    /// SequenceReset (4), both gap-fill and reset modes.
    SequenceReset {
        /// GapFillFlag (tag 123); absent means reset mode.
        gap_fill: bool,
        /// NewSeqNo (tag 36).
        new_seq_no: u64,
    },
    /// Reject (3).
    Reject {
        /// RefSeqNum (tag 45).
        ref_seq_num: Option<u64>,
        /// Text (tag 58).
        text: Option<String>,
    },
    /// Logout (5).
    Logout {
        /// Text (tag 58).
        text: Option<String>,
    },
}

impl AdminMessage {
    /// Parses an admin message from a decoded frame.
    ///
    /// # Returns
    /// `Ok(None)` for application messages.
    ///
    /// # Errors
    /// Returns `DecodeError` when a required admin field is missing or
    /// malformed.
    pub fn from_raw(raw: &RawMessage<'_>) -> Result<Option<Self>, DecodeError> {
        let required = |tag: u32| {
            raw.get_field(tag)
                .ok_or(DecodeError::MissingRequiredField { tag })
        };
        let optional_str = |tag: u32| -> Result<Option<String>, DecodeError> {
            match raw.get_field(tag) {
                Some(f) => Ok(Some(f.as_str()?.to_string())),
                None => Ok(None),
            }
        };
        let optional_bool = |tag: u32| -> Result<bool, DecodeError> {
            match raw.get_field(tag) {
                Some(f) => f.as_bool(),
                None => Ok(false),
            }
        };

        let message = match raw.msg_type() {
            MsgType::Logon => Self::Logon {
                encrypt_method: match raw.get_field(tags::ENCRYPT_METHOD) {
                    Some(f) => f.as_u64()?,
                    None => 0,
                },
                heart_bt_int: required(tags::HEART_BT_INT)?.as_u64()?,
                reset_seq_num: optional_bool(tags::RESET_SEQ_NUM_FLAG)?,
            },
            MsgType::Heartbeat => Self::Heartbeat {
                test_req_id: optional_str(tags::TEST_REQ_ID)?,
            },
            MsgType::TestRequest => Self::TestRequest {
                test_req_id: required(tags::TEST_REQ_ID)?.as_str()?.to_string(),
            },
            MsgType::ResendRequest => Self::ResendRequest {
                begin_seq_no: required(tags::BEGIN_SEQ_NO)?.as_u64()?,
                end_seq_no: match raw.get_field(tags::END_SEQ_NO) {
                    Some(f) => f.as_u64()?,
                    None => 0,
                },
            },
            MsgType::SequenceReset => Self::SequenceReset {
                gap_fill: optional_bool(tags::GAP_FILL_FLAG)?,
                new_seq_no: required(tags::NEW_SEQ_NO)?.as_u64()?,
            },
            MsgType::Reject => Self::Reject {
                ref_seq_num: match raw.get_field(tags::REF_SEQ_NUM) {
                    Some(f) => Some(f.as_u64()?),
                    None => None,
                },
                text: optional_str(tags::TEXT)?,
            },
            MsgType::Logout => Self::Logout {
                text: optional_str(tags::TEXT)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

/// An outbound message body awaiting header stamping.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    msg_type: MsgType,
    fields: Vec<(u32, FieldValue)>,
}

impl OutboundMessage {
    /// Creates an empty message of the given type.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            fields: Vec::new(),
        }
    }

    /// Appends a body field, builder style.
    #[must_use]
    pub fn field(mut self, tag: u32, value: impl Into<FieldValue>) -> Self {
        self.fields.push((tag, value.into()));
        self
    }

    /// Appends a body field.
    pub fn push_field(&mut self, tag: u32, value: impl Into<FieldValue>) {
        self.fields.push((tag, value.into()));
    }

    /// Returns the message type.
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns the body fields in order.
    #[must_use]
    pub fn fields(&self) -> &[(u32, FieldValue)] {
        &self.fields
    }
}

/// Stamps the session header onto a message body and encodes the frame.
///
/// Field order: MsgType, SenderCompID, TargetCompID, MsgSeqNum,
/// SendingTime, then the body fields in insertion order.
#[must_use]
pub fn encode_with_header(
    config: &SessionConfig,
    message: &OutboundMessage,
    seqnum: u64,
    sending_time: Timestamp,
) -> BytesMut {
    let mut encoder = Encoder::new(config.begin_string.clone());
    encoder.put_str(tags::MSG_TYPE, message.msg_type().as_str());
    encoder.put_str(tags::SENDER_COMP_ID, config.sender_comp_id.as_str());
    encoder.put_str(tags::TARGET_COMP_ID, config.target_comp_id.as_str());
    encoder.put_uint(tags::MSG_SEQ_NUM, seqnum);
    encoder.put_timestamp(tags::SENDING_TIME, sending_time);
    for (tag, value) in message.fields() {
        encoder.put_value(*tag, value);
    }
    encoder.finish()
}

/// Builds a Logon body.
#[must_use]
pub fn logon(heart_bt_int_secs: u64, reset_seq_num: bool) -> OutboundMessage {
    let mut message = OutboundMessage::new(MsgType::Logon)
        .field(tags::ENCRYPT_METHOD, FieldValue::UInt(0))
        .field(tags::HEART_BT_INT, heart_bt_int_secs);
    if reset_seq_num {
        message.push_field(tags::RESET_SEQ_NUM_FLAG, true);
    }
    message
}

/// Builds a Heartbeat body, echoing a TestReqID when answering a
/// TestRequest.
#[must_use]
pub fn heartbeat(test_req_id: Option<&str>) -> OutboundMessage {
    let mut message = OutboundMessage::new(MsgType::Heartbeat);
    if let Some(id) = test_req_id {
        message.push_field(tags::TEST_REQ_ID, id);
    }
    message
}

/// Builds a TestRequest body.
#[must_use]
pub fn test_request(test_req_id: &str) -> OutboundMessage {
    OutboundMessage::new(MsgType::TestRequest).field(tags::TEST_REQ_ID, test_req_id)
}

/// Builds a ResendRequest body; `end_seq_no` 0 means "through infinity".
#[must_use]
pub fn resend_request(begin_seq_no: u64, end_seq_no: u64) -> OutboundMessage {
    OutboundMessage::new(MsgType::ResendRequest)
        .field(tags::BEGIN_SEQ_NO, begin_seq_no)
        .field(tags::END_SEQ_NO, end_seq_no)
}

/// Builds a SequenceReset body in reset mode.
#[must_use]
pub fn sequence_reset(new_seq_no: u64) -> OutboundMessage {
    OutboundMessage::new(MsgType::SequenceReset)
        .field(tags::GAP_FILL_FLAG, false)
        .field(tags::NEW_SEQ_NO, new_seq_no)
}

/// Builds a SequenceReset-GapFill body covering a run of skipped admin
/// messages during resend servicing.
///
/// Carries PossDupFlag and OrigSendingTime because it is replayed under an
/// already-used sequence number.
#[must_use]
pub fn gap_fill(new_seq_no: u64, sending_time: Timestamp) -> OutboundMessage {
    OutboundMessage::new(MsgType::SequenceReset)
        .field(tags::POSS_DUP_FLAG, true)
        .field(tags::ORIG_SENDING_TIME, sending_time)
        .field(tags::GAP_FILL_FLAG, true)
        .field(tags::NEW_SEQ_NO, new_seq_no)
}

/// Builds a Reject body.
#[must_use]
pub fn reject(ref_seq_num: u64, text: &str, ref_tag: Option<u32>) -> OutboundMessage {
    let mut message = OutboundMessage::new(MsgType::Reject)
        .field(tags::REF_SEQ_NUM, ref_seq_num)
        .field(tags::TEXT, text);
    if let Some(tag) = ref_tag {
        message.push_field(tags::REF_TAG_ID, FieldValue::UInt(u64::from(tag)));
    }
    message
}

/// Builds a Logout body.
#[must_use]
pub fn logout(text: Option<&str>) -> OutboundMessage {
    let mut message = OutboundMessage::new(MsgType::Logout);
    if let Some(text) = text {
        message.push_field(tags::TEXT, text);
    }
    message
}

/// Rebuilds a logged outbound message for retransmission.
///
/// Keeps the original MsgSeqNum and field order, sets PossDupFlag=Y, moves
/// the original SendingTime into OrigSendingTime and stamps a fresh
/// SendingTime.
#[must_use]
pub fn resend_transform(original: &RawMessage<'_>, now: Timestamp) -> BytesMut {
    // OrigSendingTime keeps the value of the earliest transmission.
    let orig_sending_time = original
        .get_field(tags::ORIG_SENDING_TIME)
        .or_else(|| original.get_field(tags::SENDING_TIME))
        .map(|f| f.value)
        .unwrap_or_default();

    let mut encoder = Encoder::new(original.begin_string());
    for field in original.fields() {
        match field.tag {
            tags::BEGIN_STRING | tags::BODY_LENGTH | tags::CHECK_SUM => {}
            tags::POSS_DUP_FLAG | tags::ORIG_SENDING_TIME => {}
            tags::SENDING_TIME => {
                encoder.put_bool(tags::POSS_DUP_FLAG, true);
                encoder.put_timestamp(tags::SENDING_TIME, now);
                encoder.put_raw(tags::ORIG_SENDING_TIME, orig_sending_time);
            }
            tag => encoder.put_raw(tag, field.value),
        }
    }
    encoder.finish()
}
