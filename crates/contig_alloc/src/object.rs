use alloc::sync::Arc;

use mutex_api::{Mutex, MutexFamily, TryMutex};

/// How an object's pages reach the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// File-like: flushes go through the pager with the object pinned by
    /// reference while its lock is dropped.
    File,
    /// Anonymous/swap-like: single pages are written out under the object
    /// lock.
    Anonymous,
}

/// Object state, protected by the object lock.
pub struct ObjectInner {
    backing: Backing,
    dead: bool,
}

impl ObjectInner {
    #[must_use]
    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Whether the object is mid-teardown. Pages of a dead object must not be
    /// acted on; their state is stale.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

/// Guard over [`ObjectInner`].
pub type ObjectGuard<'a, L> =
    <<L as MutexFamily>::TryMutex<ObjectInner> as Mutex>::Guard<'a>;

/// The bookkeeping entity owning a set of page frames.
///
/// Shared by `Arc`; cloning the `Arc` pins the object across a lock drop.
pub struct VmObject<L: MutexFamily> {
    inner: L::TryMutex<ObjectInner>,
}

impl<L: MutexFamily> VmObject<L> {
    #[must_use]
    pub fn new(backing: Backing) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ObjectInner {
                backing,
                dead: false,
            }),
        })
    }

    /// Non-blocking lock; `None` under contention.
    pub fn try_lock(&self) -> Option<ObjectGuard<'_, L>> {
        self.inner.try_lock()
    }

    pub fn lock(&self) -> ObjectGuard<'_, L> {
        self.inner.lock()
    }

    /// Flags the object as mid-teardown.
    pub fn mark_dead(&self) {
        self.inner.lock().dead = true;
    }
}
