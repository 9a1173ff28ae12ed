/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Inbound header validation.
//!
//! Applied to every decoded message before sequence accounting. Identity
//! violations terminate the session; the rest are answered with a Reject
//! and do not advance the expected sequence number.

use crate::config::SessionConfig;
use fixwire_core::error::SessionError;
use fixwire_core::field::tags;
use fixwire_core::message::SessionHeader;
use fixwire_core::types::Timestamp;
use fixwire_dictionary::Dictionary;

/// What to do with a message that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Answer with a Reject; the expected sequence number does not advance.
    Reject {
        /// Text for the Reject (tag 58).
        text: String,
        /// Offending tag, if identifiable (tag 371).
        ref_tag: Option<u32>,
    },
    /// Identity violation: Logout with the given reason, then close.
    Terminate(SessionError),
}

/// Validates an inbound header against the session's identity and clock.
///
/// The dictionary, when configured, supplies the known-message-type check;
/// without one every type is accepted and unknown app types flow through
/// to the application hook.
///
/// # Errors
/// Returns a [`Violation`] describing the required response.
pub fn validate_header(
    config: &SessionConfig,
    dictionary: Option<&Dictionary>,
    header: &SessionHeader,
    now: Timestamp,
) -> Result<(), Violation> {
    if header.begin_string != config.begin_string {
        return Err(Violation::Terminate(SessionError::BeginStringMismatch {
            expected: config.begin_string.clone(),
            received: header.begin_string.clone(),
        }));
    }

    // Inbound sender is our target and vice versa.
    if header.sender_comp_id != config.target_comp_id.as_str() {
        return Err(Violation::Terminate(SessionError::CompIdMismatch {
            tag: tags::SENDER_COMP_ID,
            expected: config.target_comp_id.to_string(),
            received: header.sender_comp_id.clone(),
        }));
    }
    if header.target_comp_id != config.sender_comp_id.as_str() {
        return Err(Violation::Terminate(SessionError::CompIdMismatch {
            tag: tags::TARGET_COMP_ID,
            expected: config.sender_comp_id.to_string(),
            received: header.target_comp_id.clone(),
        }));
    }

    if let Some(dict) = dictionary {
        if !dict.is_known_msg_type(header.msg_type.as_str()) {
            return Err(Violation::Reject {
                text: format!("unknown MsgType '{}'", header.msg_type),
                ref_tag: Some(tags::MSG_TYPE),
            });
        }
    }

    if header.poss_dup && header.orig_sending_time.is_none() {
        return Err(Violation::Reject {
            text: "PossDupFlag set without OrigSendingTime".to_string(),
            ref_tag: Some(tags::ORIG_SENDING_TIME),
        });
    }

    if header.sending_time.abs_diff(now) > config.sending_time_accuracy {
        return Err(Violation::Reject {
            text: "SendingTime accuracy problem".to_string(),
            ref_tag: Some(tags::SENDING_TIME),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixwire_core::message::MsgType;
    use fixwire_core::types::CompId;

    fn config() -> SessionConfig {
        SessionConfig::new(
            CompId::new("US").unwrap(),
            CompId::new("THEM").unwrap(),
            "FIX.4.4",
        )
    }

    fn header() -> SessionHeader {
        SessionHeader {
            begin_string: "FIX.4.4".to_string(),
            msg_type: MsgType::Heartbeat,
            sender_comp_id: "THEM".to_string(),
            target_comp_id: "US".to_string(),
            msg_seq_num: 1,
            sending_time: Timestamp::from_millis(1_000_000),
            poss_dup: false,
            poss_resend: false,
            orig_sending_time: None,
        }
    }

    fn now() -> Timestamp {
        Timestamp::from_millis(1_000_000)
    }

    #[test]
    fn test_valid_header() {
        assert!(validate_header(&config(), None, &header(), now()).is_ok());
    }

    #[test]
    fn test_begin_string_mismatch_terminates() {
        let mut h = header();
        h.begin_string = "FIX.4.2".to_string();
        assert!(matches!(
            validate_header(&config(), None, &h, now()),
            Err(Violation::Terminate(SessionError::BeginStringMismatch { .. }))
        ));
    }

    #[test]
    fn test_comp_id_mismatch_terminates() {
        let mut h = header();
        h.sender_comp_id = "INTRUDER".to_string();
        assert!(matches!(
            validate_header(&config(), None, &h, now()),
            Err(Violation::Terminate(SessionError::CompIdMismatch { tag: 49, .. }))
        ));

        let mut h = header();
        h.target_comp_id = "NOTUS".to_string();
        assert!(matches!(
            validate_header(&config(), None, &h, now()),
            Err(Violation::Terminate(SessionError::CompIdMismatch { tag: 56, .. }))
        ));
    }

    #[test]
    fn test_poss_dup_without_orig_sending_time_rejects() {
        let mut h = header();
        h.poss_dup = true;
        let result = validate_header(&config(), None, &h, now());
        assert!(matches!(
            result,
            Err(Violation::Reject { ref_tag: Some(122), .. })
        ));

        h.orig_sending_time = Some(Timestamp::from_millis(900_000));
        assert!(validate_header(&config(), None, &h, now()).is_ok());
    }

    #[test]
    fn test_sending_time_accuracy() {
        let h = header();
        // 121 seconds of skew against the default 120 second window.
        let skewed = Timestamp::from_millis(1_000_000 + 121_000);
        assert!(matches!(
            validate_header(&config(), None, &h, skewed),
            Err(Violation::Reject { ref_tag: Some(52), .. })
        ));

        // Exactly at the window is accepted.
        let edge = Timestamp::from_millis(1_000_000 + 120_000);
        assert!(validate_header(&config(), None, &h, edge).is_ok());
    }

    #[test]
    fn test_unknown_msg_type_with_dictionary() {
        use fixwire_dictionary::schema::{Dictionary, MessageCategory, MessageDef, Version};

        let mut dict = Dictionary::new(Version::Fix44);
        dict.add_message(MessageDef {
            msg_type: "0".to_string(),
            name: "HEARTBEAT".to_string(),
            category: MessageCategory::Admin,
            fields: vec![],
            groups: vec![],
        });

        assert!(validate_header(&config(), Some(&dict), &header(), now()).is_ok());

        let mut h = header();
        h.msg_type = MsgType::Custom("ZZ".to_string());
        assert!(matches!(
            validate_header(&config(), Some(&dict), &h, now()),
            Err(Violation::Reject { ref_tag: Some(35), .. })
        ));
    }
}
