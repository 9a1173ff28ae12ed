/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Resend request servicing.
//!
//! Walks the outgoing log over the requested range and produces, in
//! sequence order, exactly one frame per sequence number: the original
//! message with PossDupFlag=Y for application messages, and a single
//! SequenceReset-GapFill covering each contiguous run of admin messages.
//! Holes in the log are covered by gap-fills too; a message that was never
//! stored cannot be replayed, so advancing the peer past it is the only
//! protocol-legal move.

use crate::admin::{self, encode_with_header};
use crate::config::SessionConfig;
use bytes::BytesMut;
use fixwire_core::error::FixError;
use fixwire_core::types::Timestamp;
use fixwire_store::SessionStore;
use fixwire_tagvalue::decoder::Decoder;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Services an inbound ResendRequest for `[begin, end]`.
///
/// `end == 0` means "through the last sequence number we have used". The
/// returned frames keep their original sequence numbers and must be
/// written to the transport without fresh sequence assignment.
///
/// # Errors
/// Returns `FixError::Store` if the log cannot be read.
pub async fn service_resend(
    store: &dyn SessionStore,
    config: &SessionConfig,
    begin: u64,
    end: u64,
    now: Timestamp,
) -> Result<Vec<BytesMut>, FixError> {
    let (next_outgoing, _) = store.seqnums().await?;
    let last_used = next_outgoing.saturating_sub(1);

    let end = if end == 0 { last_used } else { end.min(last_used) };
    if begin == 0 || begin > end {
        debug!(begin, end, last_used, "resend request covers nothing");
        return Ok(Vec::new());
    }

    let logged: BTreeMap<u64, bytes::Bytes> = store
        .read_outgoing(begin, end)
        .await?
        .into_iter()
        .collect();

    let mut frames = Vec::new();
    // Start of the current admin/hole run awaiting a gap-fill.
    let mut gap_start: Option<u64> = None;

    for seqnum in begin..=end {
        let replay = logged.get(&seqnum).and_then(|bytes| {
            let mut decoder = Decoder::new(bytes).with_checksum_validation(false);
            match decoder.decode() {
                Ok(raw) if raw.msg_type().is_app() => Some(admin::resend_transform(&raw, now)),
                Ok(_) => None,
                Err(err) => {
                    warn!(seqnum, %err, "unreadable message in outgoing log, gap-filling");
                    None
                }
            }
        });

        match replay {
            Some(frame) => {
                if let Some(start) = gap_start.take() {
                    frames.push(encode_gap_fill(config, start, seqnum, now));
                }
                frames.push(frame);
            }
            None => {
                gap_start.get_or_insert(seqnum);
            }
        }
    }

    if let Some(start) = gap_start {
        frames.push(encode_gap_fill(config, start, end + 1, now));
    }

    debug!(begin, end, frames = frames.len(), "serviced resend request");
    Ok(frames)
}

/// Encodes a SequenceReset-GapFill advancing the peer from `start` to
/// `new_seq_no`, stamped under the run's first sequence number.
fn encode_gap_fill(
    config: &SessionConfig,
    start: u64,
    new_seq_no: u64,
    now: Timestamp,
) -> BytesMut {
    encode_with_header(config, &admin::gap_fill(new_seq_no, now), start, now)
}
