//! Physically contiguous page-frame allocation with bounded reclaim.
//!
//! Device drivers and DMA engines sometimes need runs of physically
//! consecutive page frames inside a given address window, aligned and kept
//! clear of hardware boundary lines. The ordinary page allocator cannot meet
//! those demands once memory fragments. This crate provides the facility:
//! probe the physical pool for a satisfying run, and when fragmentation wins,
//! launder reclaim-queue pages one unit at a time between bounded re-probes,
//! then bind the run into wired kernel virtual memory as a single
//! all-or-nothing step.
//!
//! The physical search itself, backing-store I/O, and page-table primitives
//! are injected through the [`FramePool`], [`Pager`], and [`AddressSpace`]
//! traits; lock types come from a [`mutex_api::MutexFamily`]. Nothing here
//! blocks indefinitely: contended pages report Busy and the request either
//! succeeds or fails within its probe budget (`NO_WAIT`: one probe,
//! `MAY_BLOCK`: three).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod addr;
mod allocator;
mod error;
mod frame;
mod launder;
mod mapper;
mod object;
mod provider;
mod queues;
mod request;
#[cfg(test)]
mod test_support;

pub use self::{
    addr::{PhysAddr, VirtAddr},
    allocator::{ContigAlloc, ContigStats},
    error::AllocError,
    frame::{BusyGuard, FrameFlags, FrameOwner, FrameRef, OwnerGuard, PageFrame},
    object::{Backing, ObjectGuard, ObjectInner, VmObject},
    provider::{AddressSpace, FramePool, Pager},
    queues::{FrameQueue, ReclaimClass, ReclaimQueues},
    request::{AllocFlags, AllocRequest, AllocTag, RunConstraints},
};

/// Bytes per page
pub const PAGE_SIZE: usize = 4096;

/// Bits of offset within a page
pub const PAGE_SHIFT: usize = 12;
