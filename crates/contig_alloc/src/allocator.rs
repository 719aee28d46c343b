//! The public allocate/release surface and its retry machine.

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::{sync::Arc, vec::Vec};

use mutex_api::{Mutex, MutexFamily};

use crate::{
    PAGE_SIZE,
    addr::VirtAddr,
    error::AllocError,
    frame::FrameRef,
    mapper::KernelMapping,
    object::{Backing, VmObject},
    provider::{AddressSpace, FramePool, Pager},
    queues::{ReclaimQueues, reclaim_schedule},
    request::{AllocRequest, AllocTag},
};

/// Point-in-time accounting snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContigStats {
    pub allocations: usize,
    pub frees: usize,
    pub bytes_in_use: usize,
    pub pages_laundered: usize,
    pub probe_retries: usize,
}

#[derive(Default)]
pub(crate) struct StatCounters {
    allocations: AtomicUsize,
    frees: AtomicUsize,
    bytes_in_use: AtomicUsize,
    pages_laundered: AtomicUsize,
    probe_retries: AtomicUsize,
}

/// Allocator for runs of physically contiguous page frames.
///
/// Composes the physical pool, the address space, and the pager behind a
/// bounded-retry allocate operation and its matching release. The reclaim
/// queues are injected so hosts share their process-wide instance and tests
/// run against their own.
pub struct ContigAlloc<Pool, Space, Flush, L: MutexFamily> {
    pub(crate) pool: Pool,
    pub(crate) space: Space,
    pub(crate) pager: Flush,
    pub(crate) queues: ReclaimQueues<L>,
    pub(crate) kernel_object: Arc<VmObject<L>>,
    pub(crate) mappings: L::Mutex<Vec<KernelMapping<L>>>,
    pub(crate) stats: StatCounters,
}

impl<Pool, Space, Flush, L> ContigAlloc<Pool, Space, Flush, L>
where
    Pool: FramePool<L>,
    Space: AddressSpace<L>,
    Flush: Pager<L>,
    L: MutexFamily,
{
    #[must_use]
    pub fn new(pool: Pool, space: Space, pager: Flush, queues: ReclaimQueues<L>) -> Self {
        Self {
            pool,
            space,
            pager,
            queues,
            kernel_object: VmObject::new(Backing::Anonymous),
            mappings: Mutex::new(Vec::new()),
            stats: StatCounters::default(),
        }
    }

    /// Allocates `request.size` bytes of physically contiguous, wired kernel
    /// memory.
    ///
    /// Probes the pool up to the blocking mode's budget (one probe for
    /// `NO_WAIT`, three for `MAY_BLOCK`), escalating reclaim pressure between
    /// probes. Either returns a mapped virtual base or fails with every frame
    /// back in the pool; no partial state survives.
    ///
    /// # Panics
    ///
    /// Panics if the request is malformed (see [`AllocRequest`]).
    pub fn alloc_contig(&self, request: &AllocRequest) -> Result<VirtAddr, AllocError> {
        request.validate();
        let npages = request.pages();
        let budget = request.probe_budget();

        let mut attempt = 0;
        loop {
            if let Some(frames) = self.pool.find_contig(npages, &request.constraints) {
                debug_assert_eq!(frames.len(), npages);
                return match self.map_run(&frames, request) {
                    Ok(base) => Ok(base),
                    Err(err) => {
                        log::debug!("contig mapping of {npages} pages failed: {err}");
                        for frame in &frames {
                            self.release_frame(frame);
                        }
                        Err(AllocError::MappingFailed)
                    }
                };
            }

            attempt += 1;
            if attempt >= budget {
                log::debug!("no contiguous run of {npages} pages after {attempt} probes");
                return Err(AllocError::ResourceExhausted);
            }

            // One unit of laundering progress per escalation, so the freed
            // memory is re-probed immediately instead of over-collected.
            self.stats.probe_retries.fetch_add(1, Ordering::Relaxed);
            for class in reclaim_schedule(attempt - 1) {
                if self.launder(class) {
                    break;
                }
            }
        }
    }

    /// Releases a mapping obtained from [`Self::alloc_contig`].
    ///
    /// Unwires and unmaps exactly `[base, base + size)` and returns every
    /// backing frame to the pool.
    ///
    /// # Panics
    ///
    /// Panics if no allocation matches `base`/`size` or if `tag` differs from
    /// the allocating tag.
    pub fn free_contig(&self, base: VirtAddr, size: usize, tag: AllocTag) {
        let mapping = {
            let mut mappings = self.mappings.lock();
            let pos = mappings
                .iter()
                .position(|mapping| mapping.base == base && mapping.size == size)
                .unwrap_or_else(|| {
                    panic!("no contiguous allocation at {base:?} of {size} bytes")
                });
            mappings.swap_remove(pos)
        };
        assert_eq!(
            mapping.tag, tag,
            "allocation at {base:?} belongs to {:?}",
            mapping.tag
        );

        let bytes = mapping.frames.len() * PAGE_SIZE;
        self.space.unwire(base, bytes);
        self.space.unmap(base, bytes);
        for frame in &mapping.frames {
            // The caller may have written anything; the contents are no
            // longer known-zero.
            frame.clear_zeroed();
            self.release_frame(frame);
        }

        self.stats.frees.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_in_use.fetch_sub(size, Ordering::Relaxed);
    }

    /// Plain deallocation: dissociates the frame and hands it back to the
    /// pool. Never launders.
    pub(crate) fn release_frame(&self, frame: &FrameRef<L>) {
        debug_assert!(frame.queue().is_none());
        {
            let mut owner = frame.owner();
            owner.object = None;
            owner.pindex = 0;
        }
        self.pool.free(frame);
    }

    pub fn stats(&self) -> ContigStats {
        ContigStats {
            allocations: self.stats.allocations.load(Ordering::Relaxed),
            frees: self.stats.frees.load(Ordering::Relaxed),
            bytes_in_use: self.stats.bytes_in_use.load(Ordering::Relaxed),
            pages_laundered: self.stats.pages_laundered.load(Ordering::Relaxed),
            probe_retries: self.stats.probe_retries.load(Ordering::Relaxed),
        }
    }

    /// The shared reclaim queues this allocator drains under pressure.
    pub fn queues(&self) -> &ReclaimQueues<L> {
        &self.queues
    }

    /// The anchoring object kernel-owned frames are bound into.
    pub fn kernel_object(&self) -> &Arc<VmObject<L>> {
        &self.kernel_object
    }
}

impl StatCounters {
    pub(crate) fn note_mapped(&self, bytes: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes_in_use.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn note_laundered(&self) {
        self.pages_laundered.fetch_add(1, Ordering::Relaxed);
    }
}
