//! Binding a contiguous run into wired kernel virtual memory.

use alloc::{sync::Arc, vec::Vec};

use mutex_api::{Mutex as _, MutexFamily};

use crate::{
    PAGE_SHIFT, PAGE_SIZE,
    addr::VirtAddr,
    allocator::ContigAlloc,
    error::MapError,
    frame::FrameRef,
    provider::{AddressSpace, FramePool, Pager},
    request::{AllocRequest, AllocTag},
};

/// A wired kernel mapping backed by one contiguous run.
pub(crate) struct KernelMapping<L: MutexFamily> {
    pub(crate) base: VirtAddr,
    pub(crate) size: usize,
    pub(crate) tag: AllocTag,
    pub(crate) frames: Vec<FrameRef<L>>,
}

impl<Pool, Space, Flush, L> ContigAlloc<Pool, Space, Flush, L>
where
    Pool: FramePool<L>,
    Space: AddressSpace<L>,
    Flush: Pager<L>,
    L: MutexFamily,
{
    /// Maps `frames` into a fresh wired kernel range.
    ///
    /// All-or-nothing: on any error no binding, wiring, or ownership change
    /// remains; the caller still owns the frames and returns them to the
    /// pool.
    ///
    /// # Panics
    ///
    /// Panics if the pool handed back frames that are not an increasing
    /// contiguous run.
    pub(crate) fn map_run(
        &self,
        frames: &[FrameRef<L>],
        request: &AllocRequest,
    ) -> Result<VirtAddr, MapError> {
        assert!(run_is_contiguous(frames), "pool returned a broken run");

        let bytes = frames.len() * PAGE_SIZE;
        let Some(base) = self.space.reserve(bytes) else {
            return Err(MapError::ReservationFailed);
        };
        debug_assert!(base.is_page_aligned());

        let base_pindex = base.addr() >> PAGE_SHIFT;
        for (i, frame) in frames.iter().enumerate() {
            debug_assert!(frame.queue().is_none());
            debug_assert!(!frame.is_busy());
            {
                let mut owner = frame.owner();
                debug_assert!(owner.object.is_none(), "pool frame still owned");
                owner.object = Some(Arc::clone(&self.kernel_object));
                owner.pindex = base_pindex + i;
            }
            if request.zero_fill() && !frame.is_zeroed() {
                self.space.zero_frame(frame);
                frame.set_zeroed();
            }
            self.space.enter(base.byte_add(i * PAGE_SIZE), frame);
        }

        if self.space.wire(base, bytes).is_err() {
            self.space.unmap(base, bytes);
            for frame in frames {
                let mut owner = frame.owner();
                owner.object = None;
                owner.pindex = 0;
            }
            return Err(MapError::WireFailed);
        }

        self.mappings.lock().push(KernelMapping {
            base,
            size: request.size,
            tag: request.tag,
            frames: frames.to_vec(),
        });
        self.stats.note_mapped(request.size);
        Ok(base)
    }
}

fn run_is_contiguous<L: MutexFamily>(frames: &[FrameRef<L>]) -> bool {
    frames
        .windows(2)
        .all(|pair| pair[0].addr().byte_add(PAGE_SIZE) == pair[1].addr())
}
