//! # WAL — Write-Ahead Log
//!
//! Per-memtable durability log for the ShoalKV write path. Every entry the
//! memtable acknowledges is appended and fsynced here first, so any committed
//! state that has not reached an immutable table yet can be rebuilt from the
//! log alone.
//!
//! ## File Layout
//!
//! One append-only file per log, named by its creation instant:
//!
//! ```text
//! wal-<YYYYMMDDhhmmss>-<nanosecond, zero-padded to 9>.log
//! ```
//!
//! The body is a concatenation of records:
//!
//! ```text
//! ┌────────────────┬───────────────────────────┐
//! │ length: i64 LE │ entry body (length bytes) │
//! └────────────────┴───────────────────────────┘
//! ```
//!
//! Entry bodies are produced by the [`types`] codec. Reads are strict: a
//! short length prefix, a short body, or a codec failure aborts with an
//! error — a torn tail record is surfaced, never silently dropped.
//!
//! ## Concurrency
//!
//! The file handle sits behind the log's own mutex. When driven through a
//! memtable the outer read/write lock already serialises access; the mutex
//! is defence in depth for direct callers.

mod pool;
mod version;

pub use pool::{BufferPool, PooledBuf};
pub use version::{compare_versions, parse_version};

use byteorder::{LittleEndian, ReadBytesExt};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, trace};
use types::{CodecError, Entry};

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The log was operated on after [`Wal::close`].
    #[error("wal is closed")]
    Closed,

    /// A record frame is torn or nonsensical (short prefix, short body,
    /// negative length).
    #[error("corrupt wal record")]
    Corrupt,

    /// A record body failed to decode.
    #[error("entry codec: {0}")]
    Codec(#[from] CodecError),

    /// A file name that does not match `wal-<ts>-<ns>.log`.
    #[error("invalid wal file name: {0}")]
    InvalidFileName(String),
}

/// A single append-only, uniquely versioned log file.
///
/// The handle lives in one of three states: open-writable, closed
/// ([`Wal::close`], idempotent), or deleted ([`Wal::delete`]). Operations on
/// a closed handle return [`WalError::Closed`].
pub struct Wal {
    /// `None` once closed.
    fd: Mutex<Option<File>>,
    dir: PathBuf,
    path: PathBuf,
    version: String,
    pool: BufferPool,
}

impl Wal {
    /// Creates a new log in `dir`, versioned from the current wall clock.
    ///
    /// Scratch buffers for [`Wal::write`]/[`Wal::read`] are borrowed from
    /// `pool`. A same-nanosecond file-name collision re-reads the clock and
    /// retries.
    pub fn create<P: AsRef<Path>>(dir: P, pool: BufferPool) -> Result<Wal, WalError> {
        let dir = dir.as_ref().to_path_buf();
        loop {
            let version = version::format_version(SystemTime::now());
            let path = dir.join(format!("wal-{version}.log"));
            match OpenOptions::new()
                .create_new(true)
                .read(true)
                .append(true)
                .open(&path)
            {
                Ok(file) => {
                    debug!(path = %path.display(), "created wal");
                    return Ok(Wal {
                        fd: Mutex::new(Some(file)),
                        dir,
                        path,
                        version,
                        pool,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Opens an existing log, recovering its version from the file name.
    pub fn open<P: AsRef<Path>>(path: P, pool: BufferPool) -> Result<Wal, WalError> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WalError::InvalidFileName(path.display().to_string()))?;
        let version = version::parse_version(name)?;
        let file = OpenOptions::new().read(true).append(true).open(&path)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Wal {
            fd: Mutex::new(Some(file)),
            dir,
            path,
            version,
            pool,
        })
    }

    /// Appends `entries` as one durable batch.
    ///
    /// Records are staged in a pooled scratch buffer, written with a single
    /// `write_all`, then fsynced. On any error the batch must be treated as
    /// undefined-durability and the caller aborts.
    pub fn write(&self, entries: &[Entry]) -> Result<(), WalError> {
        let mut guard = self.fd.lock();
        let file = guard.as_mut().ok_or(WalError::Closed)?;

        file.seek(SeekFrom::End(0))?;

        let mut buf = self.pool.get();
        for entry in entries {
            buf.extend_from_slice(&(entry.encoded_len() as i64).to_le_bytes());
            entry.encode_into(&mut buf);
            trace!(
                key = ?entry.key,
                version = entry.version,
                tombstone = entry.tombstone,
                "wal prepare entry"
            );
        }

        file.write_all(&buf)?;
        file.sync_all()?;

        debug!(bytes = buf.len(), entries = entries.len(), "wal commit");
        Ok(())
    }

    /// Reads every record from the start of the file, in append order.
    ///
    /// An empty file yields an empty batch. Framing or codec damage anywhere
    /// — including a torn tail — is an error; the recovery layer decides
    /// what that means.
    pub fn read(&self) -> Result<Vec<Entry>, WalError> {
        let mut guard = self.fd.lock();
        let file = guard.as_mut().ok_or(WalError::Closed)?;

        if file.metadata()?.len() == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(0))?;
        let mut buf = self.pool.get();
        file.read_to_end(&mut buf)?;

        let mut entries = Vec::new();
        let mut cursor: &[u8] = &buf;
        while !cursor.is_empty() {
            if cursor.len() < 8 {
                return Err(WalError::Corrupt);
            }
            let n = cursor.read_i64::<LittleEndian>()?;
            if n < 0 || n as usize > cursor.len() {
                return Err(WalError::Corrupt);
            }
            let (body, rest) = cursor.split_at(n as usize);
            entries.push(Entry::decode(body)?);
            cursor = rest;
        }
        Ok(entries)
    }

    /// Closes the file handle. Idempotent.
    pub fn close(&self) -> Result<(), WalError> {
        let mut guard = self.fd.lock();
        if let Some(file) = guard.take() {
            // surface close-time errors; dropping a File swallows them
            file.sync_all()?;
        }
        Ok(())
    }

    /// Closes this log and creates its successor in the same directory,
    /// sharing the same buffer pool.
    pub fn reset(&self) -> Result<Wal, WalError> {
        self.close()?;
        Wal::create(&self.dir, self.pool.clone())
    }

    /// Closes this log and unlinks its file.
    pub fn delete(&self) -> Result<(), WalError> {
        self.close()?;
        std::fs::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "deleted wal");
        Ok(())
    }

    /// The `<ts>-<ns>` version string embedded in the file name.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
