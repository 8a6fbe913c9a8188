//! Fixed-size node pool with bypass switch and corruption checking.
//!
//! High-frequency fixed-size allocations (callback nodes, list cells) come
//! from here. A released node goes onto the free list and is handed back on
//! the next acquire; with the bypass switch on, acquire always allocates
//! fresh and release drops, which is the configuration memory debuggers
//! want. Each node carries a canary word so a double release or a foreign
//! node is detected instead of corrupting the free list.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ironioc_error::{IocError, Result};
use parking_lot::Mutex;

const CANARY_LIVE: u32 = 0xA110_CA7E;
const CANARY_FREE: u32 = 0xF4EE_0B7E;

/// A value checked out of a [`Pool`]. Deref to the payload.
#[derive(Debug)]
pub struct PoolNode<T> {
    canary: u32,
    value: T,
}

impl<T> std::ops::Deref for PoolNode<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::DerefMut for PoolNode<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

struct PoolInner<T> {
    free: Vec<Box<PoolNode<T>>>,
    live: usize,
}

/// Fixed-size pool of `T` nodes.
///
/// Clones share the same backing store.
pub struct Pool<T> {
    inner: Arc<Mutex<PoolInner<T>>>,
    bypass: Arc<AtomicBool>,
    capacity: usize,
    make: fn() -> T,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
            bypass: Arc::clone(&self.bypass),
            capacity: self.capacity,
            make: self.make,
        }
    }
}

impl<T> Pool<T> {
    /// A pool bounded at `capacity` live nodes, each freshly built by
    /// `make`. A capacity of zero means unbounded.
    pub fn new(capacity: usize, make: fn() -> T) -> Pool<T> {
        Pool {
            inner: Arc::new(Mutex::new(PoolInner {
                free: Vec::new(),
                live: 0,
            })),
            bypass: Arc::new(AtomicBool::new(false)),
            capacity,
            make,
        }
    }

    /// Switch shared with the owning context: when set, the pool falls
    /// through to plain allocation and reclaims nothing.
    pub fn bypass_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.bypass)
    }

    /// Check a node out of the pool.
    pub fn acquire(&self) -> Result<Box<PoolNode<T>>> {
        if self.bypass.load(Ordering::Relaxed) {
            return Ok(Box::new(PoolNode {
                canary: CANARY_LIVE,
                value: (self.make)(),
            }));
        }
        let mut inner = self.inner.lock();
        if let Some(mut node) = inner.free.pop() {
            node.canary = CANARY_LIVE;
            inner.live += 1;
            return Ok(node);
        }
        if self.capacity != 0 && inner.live >= self.capacity {
            return Err(IocError::PoolExhausted {
                capacity: self.capacity,
            });
        }
        inner.live += 1;
        Ok(Box::new(PoolNode {
            canary: CANARY_LIVE,
            value: (self.make)(),
        }))
    }

    /// Return a node to the pool.
    ///
    /// Fails loudly on corruption: a node released twice or one that never
    /// came from a pool has the wrong canary.
    pub fn release(&self, mut node: Box<PoolNode<T>>) -> Result<()> {
        match node.canary {
            CANARY_LIVE => {}
            CANARY_FREE => return Err(IocError::PoolCorruption("node released twice")),
            _ => return Err(IocError::PoolCorruption("foreign node")),
        }
        if self.bypass.load(Ordering::Relaxed) {
            // Plain drop; nothing is reclaimed in bypass mode.
            return Ok(());
        }
        node.canary = CANARY_FREE;
        let mut inner = self.inner.lock();
        inner.live = inner.live.saturating_sub(1);
        inner.free.push(node);
        Ok(())
    }

    /// Number of nodes currently checked out (0 while bypassed).
    pub fn live(&self) -> usize {
        self.inner.lock().live
    }

    /// Number of nodes parked on the free list.
    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_reuses_nodes() {
        let pool: Pool<u64> = Pool::new(4, || 0);
        let node = pool.acquire().unwrap();
        assert_eq!(pool.live(), 1);
        pool.release(node).unwrap();
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.free_count(), 1);
        let _again = pool.acquire().unwrap();
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn capacity_bound_is_enforced() {
        let pool: Pool<u64> = Pool::new(2, || 0);
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, IocError::PoolExhausted { capacity: 2 }));
    }

    #[test]
    fn bypass_falls_through_to_plain_allocation() {
        let pool: Pool<u64> = Pool::new(1, || 0);
        pool.bypass_switch().store(true, Ordering::Relaxed);
        // Capacity no longer applies.
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        pool.release(a).unwrap();
        pool.release(b).unwrap();
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn double_release_is_detected() {
        let pool: Pool<u64> = Pool::new(0, || 7);
        let node = pool.acquire().unwrap();
        pool.release(node).unwrap();
        // Pull the node straight back off the free list and corrupt its
        // canary the way a double free would leave it.
        let mut node = pool.acquire().unwrap();
        node.canary = CANARY_FREE;
        let err = pool.release(node).unwrap_err();
        assert!(matches!(err, IocError::PoolCorruption(_)));
    }

    #[test]
    fn clones_share_backing_store() {
        let pool: Pool<u64> = Pool::new(0, || 0);
        let other = pool.clone();
        let node = pool.acquire().unwrap();
        other.release(node).unwrap();
        assert_eq!(pool.free_count(), 1);
    }
}
