use alloc::sync::Arc;

use arrayvec::ArrayVec;
use marked_queue::{MarkedQueue, QueueInner, Scan};
use mutex_api::MutexFamily;
use strum::FromRepr;

use crate::frame::FrameRef;

/// Reclaim class of a queued frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum ReclaimClass {
    /// Rarely referenced pages; first to be laundered.
    Inactive = 1,
    /// Recently referenced pages; laundered only under escalated pressure.
    Active = 2,
}

pub type FrameQueue<L> =
    MarkedQueue<<L as MutexFamily>::Mutex<QueueInner<FrameRef<L>>>>;

pub(crate) type FrameScan<'q, L> =
    Scan<'q, <L as MutexFamily>::Mutex<QueueInner<FrameRef<L>>>, FrameRef<L>>;

/// The shared reclaim queues, one per class.
///
/// Each queue's coarse lock is taken only for short non-blocking sections;
/// scan positions survive the drops in between (see [`marked_queue`]).
pub struct ReclaimQueues<L: MutexFamily> {
    inactive: FrameQueue<L>,
    active: FrameQueue<L>,
}

impl<L: MutexFamily> ReclaimQueues<L> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inactive: FrameQueue::<L>::new(),
            active: FrameQueue::<L>::new(),
        }
    }

    #[must_use]
    pub fn queue(&self, class: ReclaimClass) -> &FrameQueue<L> {
        match class {
            ReclaimClass::Inactive => &self.inactive,
            ReclaimClass::Active => &self.active,
        }
    }

    /// Appends the frame to the tail of the `class` queue.
    ///
    /// # Panics
    ///
    /// Panics if the frame is already on a queue; a frame belongs to at most
    /// one.
    pub fn enqueue(&self, class: ReclaimClass, frame: &FrameRef<L>) {
        assert!(
            frame.queue().is_none(),
            "frame {:?} already queued",
            frame.addr()
        );
        frame.set_queue(Some(class));
        self.queue(class).push_back(Arc::clone(frame));
    }

    /// Removes the frame from whatever queue it is on; no-op if unqueued.
    pub fn remove(&self, frame: &FrameRef<L>) {
        if let Some(class) = frame.queue() {
            let removed = self
                .queue(class)
                .remove_first(|entry| Arc::ptr_eq(entry, frame));
            debug_assert!(removed.is_some());
            frame.set_queue(None);
        }
    }

    #[must_use]
    pub fn len(&self, class: ReclaimClass) -> usize {
        self.queue(class).len()
    }
}

impl<L: MutexFamily> Default for ReclaimQueues<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue classes laundered at the given escalation round.
///
/// Round 0 touches only the inactive queue; later rounds add the active
/// queue. The schedule is a pressure heuristic, not a contract; the probe
/// budget alone bounds the retry loop.
pub(crate) fn reclaim_schedule(round: u32) -> ArrayVec<ReclaimClass, 2> {
    let mut classes = ArrayVec::new();
    classes.push(ReclaimClass::Inactive);
    if round > 0 {
        classes.push(ReclaimClass::Active);
    }
    classes
}
