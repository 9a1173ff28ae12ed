/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! In-memory session store implementation.
//!
//! Suitable for tests and sessions that do not need to survive a restart.

use crate::traits::SessionStore;
use async_trait::async_trait;
use bytes::Bytes;
use fixwire_core::error::StoreError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::SystemTime;

#[derive(Debug)]
struct Inner {
    messages: BTreeMap<u64, Bytes>,
    outgoing_seqnum: u64,
    incoming_seqnum: u64,
}

/// In-memory session store.
///
/// Messages live in a `BTreeMap` for efficient range queries. Nothing is
/// persistent; all state is lost when the process exits.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    creation_time: SystemTime,
}

impl MemoryStore {
    /// Creates a new empty memory store with both seqnums at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seqnums(1, 1)
    }

    /// Creates a memory store with the given starting seqnums.
    #[must_use]
    pub fn with_seqnums(outgoing: u64, incoming: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                messages: BTreeMap::new(),
                outgoing_seqnum: outgoing,
                incoming_seqnum: incoming,
            }),
            creation_time: SystemTime::now(),
        }
    }

    /// Returns the number of stored messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner.lock().messages.len()
    }

    /// Checks if a message with the given sequence number exists.
    #[must_use]
    pub fn contains(&self, seqnum: u64) -> bool {
        self.inner.lock().messages.contains_key(&seqnum)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn seqnums(&self) -> Result<(u64, u64), StoreError> {
        let inner = self.inner.lock();
        Ok((inner.outgoing_seqnum, inner.incoming_seqnum))
    }

    async fn set_seqnums(&self, outgoing: u64, incoming: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.outgoing_seqnum = outgoing;
        inner.incoming_seqnum = incoming;
        Ok(())
    }

    async fn set_outgoing_seqnum(&self, seqnum: u64) -> Result<(), StoreError> {
        self.inner.lock().outgoing_seqnum = seqnum;
        Ok(())
    }

    async fn set_incoming_seqnum(&self, seqnum: u64) -> Result<(), StoreError> {
        self.inner.lock().incoming_seqnum = seqnum;
        Ok(())
    }

    async fn append_outgoing(&self, seqnum: u64, message: &[u8]) -> Result<(), StoreError> {
        self.inner
            .lock()
            .messages
            .insert(seqnum, Bytes::copy_from_slice(message));
        Ok(())
    }

    async fn read_outgoing(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
        let inner = self.inner.lock();
        let end = if end == 0 { u64::MAX } else { end };
        Ok(inner
            .messages
            .range(begin..=end)
            .map(|(seq, bytes)| (*seq, bytes.clone()))
            .collect())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.messages.clear();
        inner.outgoing_seqnum = 1;
        inner.incoming_seqnum = 1;
        Ok(())
    }

    fn creation_time(&self) -> SystemTime {
        self.creation_time
    }
}
