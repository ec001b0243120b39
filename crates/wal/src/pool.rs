//! Scratch-buffer pool shared by WAL readers and writers.
//!
//! The pool is an explicit, cloneable handle rather than a process global:
//! the engine constructs one and threads it through every WAL it creates,
//! and tests can substitute their own.

use parking_lot::Mutex;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Buffers that grew beyond this are dropped instead of pooled, so one huge
/// batch does not pin memory forever.
const MAX_POOLED_CAPACITY: usize = 4 * 1024 * 1024;

/// A pool of reusable byte buffers, safe for concurrent `get`/return.
///
/// Cloning the handle shares the underlying pool.
#[derive(Clone, Default)]
pub struct BufferPool {
    buffers: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows a cleared buffer; it returns to the pool when the guard
    /// drops.
    pub fn get(&self) -> PooledBuf {
        let buf = self.buffers.lock().pop().unwrap_or_default();
        PooledBuf {
            buf,
            pool: self.clone(),
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        self.buffers.lock().push(buf);
    }

    #[cfg(test)]
    fn pooled(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// A buffer borrowed from a [`BufferPool`]. Dereferences to `Vec<u8>`.
pub struct PooledBuf {
    buf: Vec<u8>,
    pool: BufferPool,
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        let buf = mem::take(&mut self.buf);
        self.pool.put(buf);
    }
}
