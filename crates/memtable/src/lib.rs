//! # Memtable — the mutable write path
//!
//! Composes one [`SkipList`] and one [`Wal`] behind a single read/write
//! lock. Writers mutate the index and then append to the log under the
//! exclusive lock; durability is declared only when [`Memtable::set`]
//! returns. Readers query the index under the shared lock.
//!
//! ## Lifecycle
//!
//! ```text
//! created ──recover?──▶ active ──freeze──▶ frozen
//!                         │
//!                         └──reset──▶ (successor memtable: active)
//! ```
//!
//! `active` accepts writes and reads; `frozen` accepts reads only and keeps
//! serving the index after its WAL is closed. `reset` hands back a fresh
//! memtable on a new WAL; the receiver is left to the flush path. `recover`
//! merges every strictly-older WAL in the directory into the live one and
//! deletes the drained files, so a crash mid-recovery is replayable on the
//! next boot.
//!
//! ## Fatal errors
//!
//! A WAL failure inside `set`, `freeze`, `reset`, or `recover` means the log
//! can no longer be trusted to hold acknowledged writes, so these paths
//! panic after logging. Writing to a frozen memtable is a contract violation
//! and also panics. Read paths cannot fail.

use parking_lot::RwLock;
use skiplist::SkipList;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use types::Entry;
use wal::{BufferPool, Wal, WalError};

struct Inner {
    skiplist: SkipList,
    wal: Wal,
    read_only: bool,
}

/// In-memory mutable table backed by a write-ahead log.
///
/// All methods take `&self`; the interior lock provides the
/// multiple-readers-xor-one-writer discipline, so the table can be shared
/// across threads behind an `Arc`.
pub struct Memtable {
    inner: RwLock<Inner>,
    dir: PathBuf,
    pool: BufferPool,
}

impl Memtable {
    /// Creates an active memtable in `dir`, synchronously creating its WAL.
    ///
    /// `max_level` and `p` parameterise the skip list; scratch buffers come
    /// from `pool`, which the engine shares across all WALs it owns.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        max_level: usize,
        p: f64,
        pool: BufferPool,
    ) -> Result<Memtable, WalError> {
        let dir = dir.as_ref().to_path_buf();
        let wal = Wal::create(&dir, pool.clone())?;
        Ok(Memtable {
            inner: RwLock::new(Inner {
                skiplist: SkipList::new(max_level, p),
                wal,
                read_only: false,
            }),
            dir,
            pool,
        })
    }

    /// Merges every WAL in the directory that is strictly older than the
    /// live one into this memtable, re-logging each entry before the source
    /// file is deleted. Returns the maximum entry version observed, or 0
    /// when there was nothing to recover.
    ///
    /// Must run before any other WAL is created in the directory. The
    /// engine seeds its version counter from the returned maximum.
    ///
    /// # Panics
    ///
    /// Any I/O, name-parse, or decode failure is fatal: a `.log` file that
    /// cannot be replayed in full may hold acknowledged writes.
    pub fn recover(&self) -> u64 {
        let started = Instant::now();
        let mut inner = self.inner.write();

        let mut wal_paths = Vec::new();
        let dir_entries = fs::read_dir(&self.dir).unwrap_or_else(|e| {
            error!(dir = %self.dir.display(), %e, "read dir failed");
            panic!("read dir {} failed: {e}", self.dir.display());
        });
        for dir_entry in dir_entries {
            let dir_entry = dir_entry.unwrap_or_else(|e| {
                error!(dir = %self.dir.display(), %e, "read dir failed");
                panic!("read dir {} failed: {e}", self.dir.display());
            });
            let path = dir_entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "log") {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_else(|| {
                error!(path = %path.display(), "invalid wal file name");
                panic!("invalid wal file name: {}", path.display());
            });
            let version = wal::parse_version(name).unwrap_or_else(|e| {
                error!(path = %path.display(), %e, "parse wal version failed");
                panic!("parse wal version {} failed: {e}", path.display());
            });
            if wal::compare_versions(&version, inner.wal.version()) == Ordering::Less {
                wal_paths.push(path);
            }
        }

        if wal_paths.is_empty() {
            return 0;
        }
        // file names start with wal-<ts>-<ns>, so name order is version order
        wal_paths.sort();

        info!(files = wal_paths.len(), "found wal files, recovery start");

        let mut max_version = 0u64;
        for path in &wal_paths {
            let old = Wal::open(path, self.pool.clone()).unwrap_or_else(|e| {
                error!(path = %path.display(), %e, "open wal failed");
                panic!("open wal {} failed: {e}", path.display());
            });
            let entries = old.read().unwrap_or_else(|e| {
                error!(path = %path.display(), %e, "read wal failed");
                panic!("read wal {} failed: {e}", path.display());
            });

            for entry in entries {
                max_version = max_version.max(entry.version);

                inner.skiplist.set(entry.clone());
                if let Err(e) = inner.wal.write(std::slice::from_ref(&entry)) {
                    error!(%e, "write wal failed");
                    panic!("write wal failed: {e}");
                }
            }

            // only unlink once every entry is durable in the live wal
            if let Err(e) = old.delete() {
                error!(path = %path.display(), %e, "delete wal failed");
                panic!("delete wal {} failed: {e}", path.display());
            }
        }

        info!(elapsed = ?started.elapsed(), "recovery finished");
        max_version
    }

    /// Inserts or overwrites `entry`: skip list first, then a durable WAL
    /// append, both under the exclusive lock.
    ///
    /// # Panics
    ///
    /// Panics if the memtable is frozen or the WAL append fails.
    pub fn set(&self, entry: Entry) {
        let mut inner = self.inner.write();

        if inner.read_only {
            error!("write to read-only memtable");
            panic!("write to read-only memtable");
        }

        inner.skiplist.set(entry.clone());
        if let Err(e) = inner.wal.write(std::slice::from_ref(&entry)) {
            error!(%e, "write wal failed");
            panic!("write wal failed: {e}");
        }

        debug!(
            key = ?entry.key,
            value_len = entry.value.len(),
            tombstone = entry.tombstone,
            version = entry.version,
            "memtable set"
        );
    }

    /// Point lookup. A tombstone is returned as-is; filtering deletes is
    /// the caller's concern.
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        self.inner.read().skiplist.get(key).cloned()
    }

    /// First entry with key `>= key`, if any.
    pub fn lower_bound(&self, key: &[u8]) -> Option<Entry> {
        self.inner.read().skiplist.lower_bound(key).cloned()
    }

    /// All entries with `start <= key < end`, ascending.
    pub fn scan(&self, start: &[u8], end: &[u8]) -> Vec<Entry> {
        self.inner.read().skiplist.scan(start, end)
    }

    /// Every entry, ascending.
    pub fn all(&self) -> Vec<Entry> {
        self.inner.read().skiplist.all()
    }

    /// Byte estimate of the indexed entries; the engine freezes the table
    /// once this crosses its threshold.
    pub fn size(&self) -> usize {
        self.inner.read().skiplist.size()
    }

    pub fn len(&self) -> usize {
        self.inner.read().skiplist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().skiplist.is_empty()
    }

    /// Closes the WAL and marks the table read-only. Reads keep serving the
    /// index; the flush path drains it from here.
    ///
    /// # Panics
    ///
    /// Panics if closing the WAL fails.
    pub fn freeze(&self) {
        let mut inner = self.inner.write();

        if let Err(e) = inner.wal.close() {
            error!(%e, "wal close failed");
            panic!("wal close failed: {e}");
        }
        inner.read_only = true;

        debug!("memtable frozen");
    }

    /// Pivots writes to a successor: closes the current WAL, creates a
    /// fresh one, and returns a new active memtable with a cleared index in
    /// the same directory. The receiver keeps its contents for the flush
    /// path but will no longer accept writes (its WAL is closed).
    ///
    /// # Panics
    ///
    /// Panics if the WAL cannot be reset.
    pub fn reset(&self) -> Memtable {
        let inner = self.inner.write();

        let successor_wal = inner.wal.reset().unwrap_or_else(|e| {
            error!(%e, "wal reset failed");
            panic!("wal reset failed: {e}");
        });

        Memtable {
            inner: RwLock::new(Inner {
                skiplist: inner.skiplist.reset(),
                wal: successor_wal,
                read_only: false,
            }),
            dir: self.dir.clone(),
            pool: self.pool.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
