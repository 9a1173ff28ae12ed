/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! Session store trait definition.
//!
//! The store is the only durable resource the session layer owns: a pair of
//! sequence numbers and an append-only log of outgoing messages keyed by
//! sequence number. The session task is the sole accessor of its store; no
//! cross-task locking is assumed.

use async_trait::async_trait;
use bytes::Bytes;
use fixwire_core::error::StoreError;
use std::time::SystemTime;

/// Abstract persistence for one FIX session.
///
/// Sequence number records are created lazily on first use and never
/// deleted; an administrative reset rewrites both to 1 atomically.
///
/// Durability contract: the outgoing seqnum update and the matching
/// `append_outgoing` for a given send must be observed together or not at
/// all after a crash.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the `(outgoing, incoming)` sequence number pair.
    ///
    /// Both are "next expected": the number the next outbound message will
    /// carry, and the number the next inbound message should carry.
    ///
    /// # Errors
    /// Returns `StoreError` if the record cannot be read.
    async fn seqnums(&self) -> Result<(u64, u64), StoreError>;

    /// Persists both sequence numbers.
    ///
    /// # Errors
    /// Returns `StoreError` if the record cannot be written.
    async fn set_seqnums(&self, outgoing: u64, incoming: u64) -> Result<(), StoreError>;

    /// Persists the outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the record cannot be written.
    async fn set_outgoing_seqnum(&self, seqnum: u64) -> Result<(), StoreError>;

    /// Persists the incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the record cannot be written.
    async fn set_incoming_seqnum(&self, seqnum: u64) -> Result<(), StoreError>;

    /// Appends an outgoing message under its sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the message cannot be stored.
    async fn append_outgoing(&self, seqnum: u64, message: &[u8]) -> Result<(), StoreError>;

    /// Reads outgoing messages in `[begin, end]`, in sequence order.
    ///
    /// `end == 0` means "through the end of the log". Sequence numbers with
    /// no stored message are simply absent from the result; the caller
    /// decides how to cover the holes.
    ///
    /// # Errors
    /// Returns `StoreError` if the log cannot be read.
    async fn read_outgoing(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError>;

    /// Resets the store: both seqnums back to 1, outgoing log cleared.
    ///
    /// # Errors
    /// Returns `StoreError` if the reset fails.
    async fn reset(&self) -> Result<(), StoreError>;

    /// Returns the creation time of the store/session.
    fn creation_time(&self) -> SystemTime;
}
