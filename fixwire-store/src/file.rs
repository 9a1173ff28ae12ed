/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! File-tree session store implementation.
//!
//! Layout under the store root, one directory per session:
//!
//! ```text
//! <root>/<SENDER>-<TARGET>/seqnums.txt      "outgoing:incoming\n"
//! <root>/<SENDER>-<TARGET>/messages/<seq>   one file per outgoing message
//! ```
//!
//! The seqnum record is replaced via a temp file and rename, so a crash
//! leaves either the old pair or the new pair, never a torn write. On the
//! send path the session appends the message file before bumping the
//! seqnum record, which keeps the pair-of-writes contract: a persisted
//! outgoing seqnum implies every message below it is in the log.

use crate::traits::SessionStore;
use async_trait::async_trait;
use bytes::Bytes;
use fixwire_core::error::StoreError;
use fixwire_core::types::SessionId;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

const SEQNUM_FILE: &str = "seqnums.txt";
const MESSAGE_DIR: &str = "messages";

fn io_err(err: std::io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

/// A directory of file-backed sessions.
///
/// Sessions are keyed by comp id pair; each gets its own subdirectory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a file store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens (creating if necessary) the session for the given identity.
    ///
    /// # Errors
    /// Returns `StoreError` if the directory cannot be created or the
    /// seqnum record is unreadable.
    pub async fn session(&self, session_id: &SessionId) -> Result<FileSession, StoreError> {
        let dir = self.root.join(format!(
            "{}-{}",
            session_id.sender_comp_id, session_id.target_comp_id
        ));
        FileSession::open(dir).await
    }
}

/// File-backed store for a single session.
#[derive(Debug)]
pub struct FileSession {
    dir: PathBuf,
    seqnum_path: PathBuf,
    message_dir: PathBuf,
    /// Cached `(outgoing, incoming)` pair; the file is the source of truth.
    seqnums: Mutex<(u64, u64)>,
    creation_time: SystemTime,
}

impl FileSession {
    /// Opens a session directory, creating it and a fresh `1:1` seqnum
    /// record if it does not exist yet.
    ///
    /// # Errors
    /// Returns `StoreError` on I/O failure or a corrupt seqnum record.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let message_dir = dir.join(MESSAGE_DIR);
        tokio::fs::create_dir_all(&message_dir).await.map_err(io_err)?;

        let seqnum_path = dir.join(SEQNUM_FILE);
        let seqnums = match tokio::fs::read_to_string(&seqnum_path).await {
            Ok(contents) => parse_seqnums(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                write_seqnums_atomic(&seqnum_path, 1, 1).await?;
                (1, 1)
            }
            Err(err) => return Err(io_err(err)),
        };

        debug!(dir = %dir.display(), outgoing = seqnums.0, incoming = seqnums.1, "opened file session");

        Ok(Self {
            dir,
            seqnum_path,
            message_dir,
            seqnums: Mutex::new(seqnums),
            creation_time: SystemTime::now(),
        })
    }

    /// Returns the session directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn message_path(&self, seqnum: u64) -> PathBuf {
        self.message_dir.join(format!("{seqnum:010}"))
    }
}

fn parse_seqnums(contents: &str) -> Result<(u64, u64), StoreError> {
    let line = contents.lines().next().unwrap_or_default();
    let (outgoing, incoming) = line.split_once(':').ok_or_else(|| StoreError::Corrupted {
        reason: format!("malformed seqnum record '{line}'"),
    })?;
    let parse = |s: &str| {
        s.trim().parse::<u64>().map_err(|_| StoreError::Corrupted {
            reason: format!("malformed seqnum record '{line}'"),
        })
    };
    Ok((parse(outgoing)?, parse(incoming)?))
}

async fn write_seqnums_atomic(
    path: &Path,
    outgoing: u64,
    incoming: u64,
) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, format!("{outgoing}:{incoming}\n"))
        .await
        .map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

#[async_trait]
impl SessionStore for FileSession {
    async fn seqnums(&self) -> Result<(u64, u64), StoreError> {
        Ok(*self.seqnums.lock())
    }

    async fn set_seqnums(&self, outgoing: u64, incoming: u64) -> Result<(), StoreError> {
        write_seqnums_atomic(&self.seqnum_path, outgoing, incoming).await?;
        *self.seqnums.lock() = (outgoing, incoming);
        Ok(())
    }

    async fn set_outgoing_seqnum(&self, seqnum: u64) -> Result<(), StoreError> {
        let incoming = self.seqnums.lock().1;
        self.set_seqnums(seqnum, incoming).await
    }

    async fn set_incoming_seqnum(&self, seqnum: u64) -> Result<(), StoreError> {
        let outgoing = self.seqnums.lock().0;
        self.set_seqnums(outgoing, seqnum).await
    }

    async fn append_outgoing(&self, seqnum: u64, message: &[u8]) -> Result<(), StoreError> {
        tokio::fs::write(self.message_path(seqnum), message)
            .await
            .map_err(|err| StoreError::StoreFailed {
                seq_num: seqnum,
                reason: err.to_string(),
            })
    }

    async fn read_outgoing(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
        let mut seqnums = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.message_dir).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name();
            let Some(seqnum) = name.to_str().and_then(|s| s.parse::<u64>().ok()) else {
                continue;
            };
            if seqnum >= begin && (end == 0 || seqnum <= end) {
                seqnums.push(seqnum);
            }
        }
        seqnums.sort_unstable();

        let mut result = Vec::with_capacity(seqnums.len());
        for seqnum in seqnums {
            let bytes = tokio::fs::read(self.message_path(seqnum))
                .await
                .map_err(|err| StoreError::RetrieveFailed {
                    seq_num: seqnum,
                    reason: err.to_string(),
                })?;
            result.push((seqnum, Bytes::from(bytes)));
        }
        Ok(result)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        tokio::fs::remove_dir_all(&self.message_dir)
            .await
            .map_err(io_err)?;
        tokio::fs::create_dir_all(&self.message_dir)
            .await
            .map_err(io_err)?;
        self.set_seqnums(1, 1).await
    }

    fn creation_time(&self) -> SystemTime {
        self.creation_time
    }
}
