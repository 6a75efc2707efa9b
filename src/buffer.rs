//! Pooled byte buffers backing packet payloads.
//!
//! Buffers are drawn from one of two size-tiered pools so that steady-state
//! packet traffic reuses allocations instead of hitting the allocator per
//! packet. Ownership is expressed in the type system: a [`PooledBuffer`] is
//! exclusively owned and resizable, a [`SharedBuffer`] is an immutable,
//! cheaply-cloneable handle whose clone/drop pair takes the place of manual
//! retain/release calls. The last handle to drop returns the backing storage
//! to its originating pool, unless the buffer grew past the pool cap, in
//! which case it is deallocated normally to bound pool memory.

use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// Sizes below this are served from the small pool.
const LARGE_THRESHOLD: usize = 64 * 1024;
/// Buffers that grew beyond this are not returned to a pool.
const MAX_POOLED_CAPACITY: usize = 1024 * 1024;
/// Cap on the number of idle buffers kept per tier.
const MAX_POOLED_BUFFERS: usize = 64;

/// A two-tier pool of reusable byte buffers.
///
/// Cloning a `BufferPool` clones a handle to the same underlying pools, so a
/// pool can be shared between a session and the packets it emits. A
/// process-wide pool is available via [`BufferPool::global`]; tests construct
/// isolated pools instead.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    small: Mutex<Vec<Vec<u8>>>,
    large: Mutex<Vec<Vec<u8>>>,
}

impl PoolInner {
    fn tier(&self, size: usize) -> &Mutex<Vec<Vec<u8>>> {
        if size < LARGE_THRESHOLD {
            &self.small
        } else {
            &self.large
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        let mut tier = self.tier(buf.capacity()).lock();
        if tier.len() < MAX_POOLED_BUFFERS {
            tier.push(buf);
        }
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner::default()),
        }
    }

    /// The process-wide pool used when no explicit pool is supplied.
    pub fn global() -> &'static BufferPool {
        static GLOBAL: OnceLock<BufferPool> = OnceLock::new();
        GLOBAL.get_or_init(BufferPool::new)
    }

    /// Returns a buffer whose logical length equals `size`.
    ///
    /// The backing capacity is reused from a pool hit when possible and only
    /// reallocated when insufficient. Contents are zeroed.
    pub fn get(&self, size: usize) -> PooledBuffer {
        let mut buf = self.inner.tier(size).lock().pop().unwrap_or_default();
        buf.clear();
        buf.resize(size, 0);
        PooledBuffer {
            data: buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of idle buffers in the (small, large) tiers. Used by tests to
    /// observe return-to-pool behavior.
    pub fn idle(&self) -> (usize, usize) {
        (self.inner.small.lock().len(), self.inner.large.lock().len())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// An exclusively-owned, resizable buffer drawn from a [`BufferPool`].
///
/// Dropping the buffer returns its storage to the pool. Call
/// [`PooledBuffer::freeze`] to convert it into a shareable handle once its
/// contents are final.
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Changes the logical length. Grows in place when `n` fits the current
    /// capacity, otherwise reallocates and copies.
    pub fn resize(&mut self, n: usize) {
        self.data.resize(n, 0);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Converts this buffer into an immutable shared handle without copying.
    pub fn freeze(mut self) -> SharedBuffer {
        let data = std::mem::take(&mut self.data);
        SharedBuffer {
            inner: Arc::new(SharedInner {
                data,
                pool: Arc::clone(&self.pool),
            }),
        }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // freeze() leaves an empty Vec behind; pooling it is harmless.
        let data = std::mem::take(&mut self.data);
        if data.capacity() > 0 {
            self.pool.put(data);
        }
    }
}

/// A reference-counted, immutable view of a pooled buffer.
///
/// `clone` retains, `drop` releases; the pairing is enforced by the
/// compiler, so a forgotten or doubled release cannot be expressed. When the
/// last handle drops, the storage goes back to its originating pool.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<SharedInner>,
}

struct SharedInner {
    data: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl Drop for SharedInner {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        if data.capacity() > 0 {
            self.pool.put(data);
        }
    }
}

impl SharedBuffer {
    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    /// Number of live handles, including this one.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Deref for SharedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.inner.data
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedBuffer(len={})", self.len())
    }
}
