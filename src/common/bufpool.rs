//! Buffer Pool
//!
//! Reusable packet buffers for the UDP read loop. A buffer handed out as a
//! [`PooledBuf`] goes back to its pool exactly once, when the guard drops,
//! whether the packet was delivered or discarded.

use std::ops::Deref;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

/// Default number of idle buffers a pool keeps around
const DEFAULT_POOL_CAPACITY: usize = 256;

/// Buffer pool for packet-sized allocations
pub struct BufferPool {
    /// Idle buffers
    pool: Mutex<Vec<BytesMut>>,
    /// Maximum number of idle buffers to keep
    capacity: usize,
    /// Size of each buffer
    buffer_size: usize,
}

impl BufferPool {
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            pool: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            buffer_size,
        }
    }

    /// Pool of `buffer_size` buffers with the default idle capacity.
    pub fn with_buffer_size(buffer_size: usize) -> Arc<Self> {
        Arc::new(Self::new(DEFAULT_POOL_CAPACITY, buffer_size))
    }

    /// Take a zero-filled buffer of at least `size` bytes.
    pub fn acquire(&self, size: usize) -> BytesMut {
        let size = size.max(self.buffer_size);
        let mut buf = self
            .pool
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(size));
        buf.clear();
        buf.resize(size, 0);
        buf
    }

    /// Return a buffer. Dropped when the pool is already full.
    pub fn release(&self, mut buf: BytesMut) {
        let mut pool = self.pool.lock();
        if pool.len() < self.capacity {
            buf.clear();
            pool.push(buf);
        }
    }

    /// Acquire a buffer wrapped in a guard that releases it on drop.
    pub fn get(self: &Arc<Self>) -> PooledBuf {
        PooledBuf {
            buf: Some(self.acquire(self.buffer_size)),
            len: 0,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffers
    pub fn idle(&self) -> usize {
        self.pool.lock().len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// A pooled buffer holding `len` valid bytes.
pub struct PooledBuf {
    buf: Option<BytesMut>,
    len: usize,
    pool: Arc<BufferPool>,
}

impl PooledBuf {
    /// The whole buffer, for reading into.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        match self.buf.as_mut() {
            Some(buf) => &mut buf[..],
            None => &mut [],
        }
    }

    /// Mark the first `len` bytes as valid.
    pub fn set_len(&mut self, len: usize) {
        let cap = self.buf.as_ref().map_or(0, |b| b.len());
        self.len = len.min(cap);
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self.buf.as_ref() {
            Some(buf) => &buf[..self.len],
            None => &[],
        }
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release() {
        let pool = BufferPool::new(2, 1024);
        assert_eq!(pool.idle(), 0);

        let buf = pool.acquire(512);
        assert_eq!(buf.len(), 1024);
        pool.release(buf);
        assert_eq!(pool.idle(), 1);

        let big = pool.acquire(4096);
        assert_eq!(big.len(), 4096);
        pool.release(big);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_release_beyond_capacity_drops() {
        let pool = BufferPool::new(1, 64);
        let a = pool.acquire(64);
        let b = pool.acquire(64);
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_pooled_buf_returns_once_on_drop() {
        let pool = BufferPool::with_buffer_size(16);
        {
            let mut pb = pool.get();
            pb.spare_mut()[..3].copy_from_slice(b"abc");
            pb.set_len(3);
            assert_eq!(&pb[..], b"abc");
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);

        let pb = pool.get();
        assert_eq!(pool.idle(), 0);
        assert!(pb.is_empty());
        drop(pb);
        assert_eq!(pool.idle(), 1);
    }
}
