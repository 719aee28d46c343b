//! Page laundering: making queued frames reclaimable.
//!
//! The launderer inspects one reclaim-queue candidate at a time and either
//! frees it (clean), cleans it through the pager (dirty), or reports it
//! unavailable. Contention is never waited out: anything still locked after
//! one bounded fallback is reported Busy so the caller probes elsewhere.

use alloc::sync::Arc;

use mutex_api::MutexFamily;

use crate::{
    allocator::ContigAlloc,
    object::{Backing, ObjectGuard, VmObject},
    provider::{AddressSpace, FramePool, Pager},
    queues::{FrameScan, ReclaimClass},
};

/// Outcome of one laundering step.
pub(crate) enum LaunderStep {
    /// A frame was freed or cleaned.
    Progress,
    /// The candidate is locked, busy, or held; try elsewhere.
    Busy,
    /// The candidate cannot be acted on right now; keep scanning.
    Skip,
    /// No candidate left in the queue.
    Exhausted,
}

impl<Pool, Space, Flush, L> ContigAlloc<Pool, Space, Flush, L>
where
    Pool: FramePool<L>,
    Space: AddressSpace<L>,
    Flush: Pager<L>,
    L: MutexFamily,
{
    /// Drives the launderer across the `class` queue.
    ///
    /// Returns `true` after exactly one unit of progress, so the retry loop
    /// re-probes the pool promptly; `false` on a Busy report or queue
    /// exhaustion.
    pub(crate) fn launder(&self, class: ReclaimClass) -> bool {
        let mut scan = self.queues.queue(class).scan();
        loop {
            match self.launder_one(&mut scan) {
                LaunderStep::Progress => {
                    self.stats.note_laundered();
                    log::trace!("laundered one frame from the {class:?} queue");
                    return true;
                }
                LaunderStep::Busy | LaunderStep::Exhausted => return false,
                LaunderStep::Skip => {}
            }
        }
    }

    fn launder_one(&self, scan: &mut FrameScan<'_, L>) -> LaunderStep {
        let Some(frame) = scan.next() else {
            return LaunderStep::Exhausted;
        };
        if frame.held() {
            return LaunderStep::Busy;
        }

        let object = frame.owner().object.clone();
        let Some(object) = object else {
            // Ownerless queued frames are clean by construction.
            let Some(busy) = frame.try_busy() else {
                return LaunderStep::Busy;
            };
            debug_assert!(!frame.is_dirty());
            self.queues.remove(&frame);
            drop(busy);
            self.pool.free(&frame);
            return LaunderStep::Progress;
        };

        let Some(guard) = lock_object(&object) else {
            return LaunderStep::Busy;
        };
        if guard.is_dead() {
            // Mid-teardown; its page state is stale. Try again later.
            return LaunderStep::Skip;
        }
        let Some(busy) = frame.try_busy() else {
            return LaunderStep::Busy;
        };
        {
            // The owner may have changed before the object lock was won.
            let owner = frame.owner();
            match &owner.object {
                Some(current) if Arc::ptr_eq(current, &object) => {}
                _ => return LaunderStep::Skip,
            }
        }

        self.space.refresh_dirty(&frame);

        if !frame.is_dirty() {
            self.queues.remove(&frame);
            frame.owner().object = None;
            drop(guard);
            drop(busy);
            self.pool.free(&frame);
            return LaunderStep::Progress;
        }

        let backing = guard.backing();
        let result = match backing {
            Backing::File => {
                // `object` pins the owner by reference; its lock is not held
                // during pager I/O.
                drop(guard);
                self.pager.writeback(&object, &frame)
            }
            Backing::Anonymous => {
                let result = self.pager.writeback(&object, &frame);
                drop(guard);
                result
            }
        };
        match result {
            Ok(()) => {
                frame.clear_dirty();
                LaunderStep::Progress
            }
            // The frame stays dirty and queued; a later pass retries it.
            Err(_) => LaunderStep::Skip,
        }
    }
}

/// Non-blocking object lock with one bounded fallback attempt.
fn lock_object<L: MutexFamily>(object: &Arc<VmObject<L>>) -> Option<ObjectGuard<'_, L>> {
    object.try_lock().or_else(|| {
        core::hint::spin_loop();
        object.try_lock()
    })
}
