//! Consumer-owned byte-buffer pool (SPEC_FULL.md ambient "Buffer pool").
//!
//! Encoders write into a reusable `Vec<u8>` rather than allocating one per
//! record. The pool is a simple bounded free list behind a `parking_lot`
//! mutex — cold path only (touched once per batch, not per record), so a
//! lock is an acceptable tradeoff for the simplicity it buys.

use parking_lot::Mutex;

/// Bounded free list of reusable encode buffers.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    default_capacity: usize,
}

impl BufferPool {
    /// Creates a pool that retains at most `max_pooled` buffers, each newly
    /// allocated with `default_capacity` bytes of headroom.
    pub fn new(max_pooled: usize, default_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            default_capacity,
        }
    }

    /// Takes a buffer from the pool, or allocates a fresh one if empty.
    pub fn acquire(&self) -> Vec<u8> {
        self.free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.default_capacity))
    }

    /// Returns a buffer to the pool for reuse, after clearing its contents.
    ///
    /// Buffers beyond `max_pooled` are dropped rather than retained, so a
    /// transient burst of oversized batches doesn't pin memory forever.
    pub fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }

    /// Number of buffers currently held in reserve.
    pub fn pooled_count(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(64, 512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_round_trips() {
        let pool = BufferPool::new(4, 16);
        let buf = pool.acquire();
        assert!(buf.capacity() >= 16);
        pool.release(buf);
        assert_eq!(pool.pooled_count(), 1);
        let buf2 = pool.acquire();
        assert_eq!(pool.pooled_count(), 0);
        pool.release(buf2);
    }

    #[test]
    fn release_past_max_pooled_is_dropped() {
        let pool = BufferPool::new(1, 8);
        pool.release(Vec::new());
        pool.release(Vec::new());
        assert_eq!(pool.pooled_count(), 1);
    }

    #[test]
    fn released_buffers_are_cleared() {
        let pool = BufferPool::new(2, 8);
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"hello");
        pool.release(buf);
        let buf2 = pool.acquire();
        assert!(buf2.is_empty());
    }
}
