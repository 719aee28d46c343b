//! Collaborator seams.
//!
//! The physical free-frame search, backing-store I/O, and address-space
//! primitives live outside this crate. They are injected at construction so
//! hosts can supply their real machinery and tests can script every outcome.

use alloc::{sync::Arc, vec::Vec};

use mutex_api::MutexFamily;

use crate::{addr::VirtAddr, frame::FrameRef, object::VmObject, request::RunConstraints};

/// The physical free-frame pool (buddy/region search).
pub trait FramePool<L: MutexFamily> {
    /// Searches the pool for `count` physically consecutive free frames
    /// satisfying `constraints`, claiming them and returning them in
    /// ascending physical order.
    fn find_contig(&self, count: usize, constraints: &RunConstraints)
    -> Option<Vec<FrameRef<L>>>;

    /// Returns one frame to the pool.
    fn free(&self, frame: &FrameRef<L>);
}

/// Synchronous backing-store writeback.
///
/// Non-reentrant: implementations must not call back into the allocator.
pub trait Pager<L: MutexFamily> {
    type Error;

    /// Writes the frame's contents out through its owning object.
    fn writeback(&self, object: &Arc<VmObject<L>>, frame: &FrameRef<L>)
    -> Result<(), Self::Error>;
}

/// Kernel virtual address space and page-table primitives.
pub trait AddressSpace<L: MutexFamily> {
    type Error;

    /// Reserves a free page-aligned range of `bytes`.
    ///
    /// `None` only under kernel virtual address exhaustion.
    fn reserve(&self, bytes: usize) -> Option<VirtAddr>;

    /// Binds `frame` at `va`.
    fn enter(&self, va: VirtAddr, frame: &FrameRef<L>);

    /// Marks the range non-pageable.
    fn wire(&self, base: VirtAddr, bytes: usize) -> Result<(), Self::Error>;

    fn unwire(&self, base: VirtAddr, bytes: usize);

    /// Removes the bindings for the range.
    fn unmap(&self, base: VirtAddr, bytes: usize);

    /// Fills the frame's memory with zeroes.
    fn zero_frame(&self, frame: &FrameRef<L>);

    /// Folds hardware dirty state from the frame's current mappings into its
    /// dirty flag.
    fn refresh_dirty(&self, frame: &FrameRef<L>);
}
