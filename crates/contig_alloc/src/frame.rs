//! Page frames and the busy-ownership rule.
//!
//! Flag word, hold count, and queue tag are atomics touched only in short
//! sections; the owner record sits behind its own short-section lock. An
//! operation that wins the BUSY bit (receiving a [`BusyGuard`]) owns the
//! frame exclusively until the guard drops.

use core::{
    fmt,
    sync::atomic::{AtomicU8, AtomicU32, Ordering},
};

use alloc::sync::Arc;

use mutex_api::{Mutex, MutexFamily};

use crate::{addr::PhysAddr, object::VmObject, queues::ReclaimClass};

bitflags::bitflags! {
    /// Per-frame flag bits, stored in one atomic word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u32 {
        /// Exclusively owned by one operation.
        const BUSY = 1 << 0;
        /// Contents differ from the backing store.
        const DIRTY = 1 << 1;
        /// Contents known to be all zero.
        const ZEROED = 1 << 2;
    }
}

/// Shared handle to a page frame.
pub type FrameRef<L> = Arc<PageFrame<L>>;

/// Ownership record: which object the frame belongs to, and at which page
/// index within it.
pub struct FrameOwner<L: MutexFamily> {
    pub object: Option<Arc<VmObject<L>>>,
    pub pindex: usize,
}

/// Guard over [`FrameOwner`].
pub type OwnerGuard<'a, L> =
    <<L as MutexFamily>::Mutex<FrameOwner<L>> as Mutex>::Guard<'a>;

/// A physical page frame.
pub struct PageFrame<L: MutexFamily> {
    addr: PhysAddr,
    flags: AtomicU32,
    hold: AtomicU32,
    queue: AtomicU8,
    owner: L::Mutex<FrameOwner<L>>,
}

impl<L: MutexFamily> PageFrame<L> {
    /// Creates the frame record for the page at `addr`.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not page-aligned.
    #[must_use]
    pub fn new(addr: PhysAddr) -> FrameRef<L> {
        assert!(addr.is_page_aligned(), "unaligned frame {addr:?}");
        Arc::new(Self {
            addr,
            flags: AtomicU32::new(0),
            hold: AtomicU32::new(0),
            queue: AtomicU8::new(0),
            owner: Mutex::new(FrameOwner {
                object: None,
                pindex: 0,
            }),
        })
    }

    #[must_use]
    pub fn addr(&self) -> PhysAddr {
        self.addr
    }

    fn flags(&self) -> FrameFlags {
        FrameFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    /// Attempts to take exclusive ownership of the frame.
    ///
    /// Fails if another operation already owns it; callers treat that as
    /// contention and move on rather than waiting.
    pub fn try_busy(&self) -> Option<BusyGuard<'_, L>> {
        let prev = self.flags.fetch_or(FrameFlags::BUSY.bits(), Ordering::Acquire);
        if prev & FrameFlags::BUSY.bits() != 0 {
            return None;
        }
        Some(BusyGuard { frame: self })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.flags().contains(FrameFlags::BUSY)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.flags().contains(FrameFlags::DIRTY)
    }

    pub fn set_dirty(&self) {
        self.flags
            .fetch_or(FrameFlags::DIRTY.bits(), Ordering::Relaxed);
    }

    pub fn clear_dirty(&self) {
        self.flags
            .fetch_and(!FrameFlags::DIRTY.bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        self.flags().contains(FrameFlags::ZEROED)
    }

    pub fn set_zeroed(&self) {
        self.flags
            .fetch_or(FrameFlags::ZEROED.bits(), Ordering::Relaxed);
    }

    pub fn clear_zeroed(&self) {
        self.flags
            .fetch_and(!FrameFlags::ZEROED.bits(), Ordering::Relaxed);
    }

    /// Whether any holder currently prevents the frame from being freed.
    #[must_use]
    pub fn held(&self) -> bool {
        self.hold.load(Ordering::Relaxed) > 0
    }

    /// Increments the hold count.
    ///
    /// # Panics
    ///
    /// Panics if the hold count is at its maximum value.
    pub fn hold(&self) {
        self.hold
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                assert_ne!(current, u32::MAX, "frame hold count overflow");
                Some(current + 1)
            })
            .unwrap();
    }

    /// Decrements the hold count.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not held.
    pub fn unhold(&self) {
        self.hold
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                assert!(current > 0, "frame not held");
                Some(current - 1)
            })
            .unwrap();
    }

    /// The reclaim queue the frame is on, if any.
    #[must_use]
    pub fn queue(&self) -> Option<ReclaimClass> {
        ReclaimClass::from_repr(self.queue.load(Ordering::Relaxed))
    }

    pub(crate) fn set_queue(&self, class: Option<ReclaimClass>) {
        self.queue
            .store(class.map_or(0, |class| class as u8), Ordering::Relaxed);
    }

    /// Locks and returns the frame's ownership record.
    pub fn owner(&self) -> OwnerGuard<'_, L> {
        self.owner.lock()
    }
}

impl<L: MutexFamily> fmt::Debug for PageFrame<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFrame")
            .field("addr", &self.addr)
            .field("flags", &self.flags())
            .field("hold", &self.hold.load(Ordering::Relaxed))
            .field("queue", &self.queue())
            .finish()
    }
}

/// Exclusive ownership of a busy frame.
///
/// Dropping the guard clears BUSY, exactly once.
pub struct BusyGuard<'f, L: MutexFamily> {
    frame: &'f PageFrame<L>,
}

impl<L: MutexFamily> BusyGuard<'_, L> {
    #[must_use]
    pub fn frame(&self) -> &PageFrame<L> {
        self.frame
    }
}

impl<L: MutexFamily> Drop for BusyGuard<'_, L> {
    fn drop(&mut self) {
        let prev = self
            .frame
            .flags
            .fetch_and(!FrameFlags::BUSY.bits(), Ordering::Release);
        debug_assert!(prev & FrameFlags::BUSY.bits() != 0);
    }
}
