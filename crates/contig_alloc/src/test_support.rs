//! Scripted stub collaborators for the test suites.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloc::{sync::Arc, vec::Vec};

use mutex_api::StdFamily;

use crate::{
    PAGE_SHIFT, PAGE_SIZE,
    addr::{PhysAddr, VirtAddr},
    allocator::ContigAlloc,
    frame::{FrameRef, PageFrame},
    object::{Backing, VmObject},
    provider::{AddressSpace, FramePool, Pager},
    queues::ReclaimQueues,
    request::RunConstraints,
};

pub(crate) type TestFrame = FrameRef<StdFamily>;
pub(crate) type TestAlloc = ContigAlloc<StubPool, StubSpace, StubPager, StdFamily>;

const KVA_BASE: usize = 0xffff_ffc0_0000_0000;

pub(crate) fn file_object() -> Arc<VmObject<StdFamily>> {
    VmObject::new(Backing::File)
}

pub(crate) fn anonymous_object() -> Arc<VmObject<StdFamily>> {
    VmObject::new(Backing::Anonymous)
}

/// An allocator wired to stub collaborators, which stay accessible through
/// their cloned handles.
pub(crate) struct Harness {
    pub(crate) alloc: TestAlloc,
    pub(crate) pool: StubPool,
    pub(crate) space: StubSpace,
    pub(crate) pager: StubPager,
}

impl Harness {
    pub(crate) fn new(total_frames: usize) -> Self {
        let pool = StubPool::new(total_frames);
        let space = StubSpace::new();
        let pager = StubPager::new();
        let alloc = ContigAlloc::new(
            pool.clone(),
            space.clone(),
            pager.clone(),
            ReclaimQueues::new(),
        );
        Self {
            alloc,
            pool,
            space,
            pager,
        }
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

/// Free-set-backed frame pool with a real first-fit contiguous search.
#[derive(Clone)]
pub(crate) struct StubPool(Arc<PoolState>);

struct PoolState {
    frames: Vec<TestFrame>,
    free: Mutex<BTreeSet<usize>>,
    finds: AtomicUsize,
}

impl StubPool {
    pub(crate) fn new(total: usize) -> Self {
        Self(Arc::new(PoolState {
            frames: (0..total)
                .map(|pfn| PageFrame::new(PhysAddr::new(pfn * PAGE_SIZE)))
                .collect(),
            free: Mutex::new((0..total).collect()),
            finds: AtomicUsize::new(0),
        }))
    }

    pub(crate) fn frame(&self, pfn: usize) -> TestFrame {
        Arc::clone(&self.0.frames[pfn])
    }

    /// Takes a frame out of the free set, as if allocated elsewhere.
    pub(crate) fn claim(&self, pfn: usize) {
        assert!(
            self.0.free.lock().unwrap().remove(&pfn),
            "pfn {pfn} not free"
        );
    }

    pub(crate) fn is_free(&self, pfn: usize) -> bool {
        self.0.free.lock().unwrap().contains(&pfn)
    }

    pub(crate) fn free_count(&self) -> usize {
        self.0.free.lock().unwrap().len()
    }

    /// Number of contiguous-run probes served so far.
    pub(crate) fn finds(&self) -> usize {
        self.0.finds.load(Ordering::Relaxed)
    }
}

impl FramePool<StdFamily> for StubPool {
    fn find_contig(
        &self,
        count: usize,
        constraints: &RunConstraints,
    ) -> Option<Vec<TestFrame>> {
        self.0.finds.fetch_add(1, Ordering::Relaxed);
        let mut free = self.0.free.lock().unwrap();
        let total = self.0.frames.len();
        for start in 0..total.saturating_sub(count - 1) {
            let base = start * PAGE_SIZE;
            let end = base + count * PAGE_SIZE;
            if base % constraints.alignment != 0 {
                continue;
            }
            if PhysAddr::new(base) < constraints.low || PhysAddr::new(end) > constraints.high {
                continue;
            }
            if constraints.boundary != 0
                && base / constraints.boundary != (end - 1) / constraints.boundary
            {
                continue;
            }
            if !(start..start + count).all(|pfn| free.contains(&pfn)) {
                continue;
            }
            for pfn in start..start + count {
                free.remove(&pfn);
            }
            return Some(
                (start..start + count)
                    .map(|pfn| Arc::clone(&self.0.frames[pfn]))
                    .collect(),
            );
        }
        None
    }

    fn free(&self, frame: &TestFrame) {
        let pfn = frame.addr().addr() >> PAGE_SHIFT;
        assert!(
            self.0.free.lock().unwrap().insert(pfn),
            "pfn {pfn} double free"
        );
    }
}

/// Bump-reserving address space that records bindings, wirings, and
/// zeroings, with injectable reserve/wire failures.
#[derive(Clone)]
pub(crate) struct StubSpace(Arc<SpaceState>);

struct SpaceState {
    next: AtomicUsize,
    bound: Mutex<BTreeMap<usize, usize>>,
    wired: Mutex<BTreeSet<usize>>,
    zeroed: Mutex<BTreeSet<usize>>,
    reserve_failures: AtomicUsize,
    wire_failures: AtomicUsize,
}

impl StubSpace {
    pub(crate) fn new() -> Self {
        Self(Arc::new(SpaceState {
            next: AtomicUsize::new(KVA_BASE),
            bound: Mutex::new(BTreeMap::new()),
            wired: Mutex::new(BTreeSet::new()),
            zeroed: Mutex::new(BTreeSet::new()),
            reserve_failures: AtomicUsize::new(0),
            wire_failures: AtomicUsize::new(0),
        }))
    }

    pub(crate) fn fail_next_reserve(&self) {
        self.0.reserve_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fail_next_wire(&self) {
        self.0.wire_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bound_pfn(&self, va: VirtAddr) -> Option<usize> {
        self.0.bound.lock().unwrap().get(&va.addr()).copied()
    }

    pub(crate) fn bound_count(&self) -> usize {
        self.0.bound.lock().unwrap().len()
    }

    pub(crate) fn wired_count(&self) -> usize {
        self.0.wired.lock().unwrap().len()
    }

    pub(crate) fn zeroed_pfns(&self) -> BTreeSet<usize> {
        self.0.zeroed.lock().unwrap().clone()
    }
}

impl AddressSpace<StdFamily> for StubSpace {
    type Error = ();

    fn reserve(&self, bytes: usize) -> Option<VirtAddr> {
        if take_failure(&self.0.reserve_failures) {
            return None;
        }
        assert_eq!(bytes % PAGE_SIZE, 0);
        Some(VirtAddr::new(self.0.next.fetch_add(bytes, Ordering::Relaxed)))
    }

    fn enter(&self, va: VirtAddr, frame: &TestFrame) {
        let pfn = frame.addr().addr() >> PAGE_SHIFT;
        let prev = self.0.bound.lock().unwrap().insert(va.addr(), pfn);
        assert!(prev.is_none(), "va {va:?} bound twice");
    }

    fn wire(&self, base: VirtAddr, bytes: usize) -> Result<(), ()> {
        if take_failure(&self.0.wire_failures) {
            return Err(());
        }
        let bound = self.0.bound.lock().unwrap();
        let mut wired = self.0.wired.lock().unwrap();
        for offset in (0..bytes).step_by(PAGE_SIZE) {
            let va = base.addr() + offset;
            assert!(bound.contains_key(&va), "wiring unmapped va");
            assert!(wired.insert(va), "va wired twice");
        }
        Ok(())
    }

    fn unwire(&self, base: VirtAddr, bytes: usize) {
        let mut wired = self.0.wired.lock().unwrap();
        for offset in (0..bytes).step_by(PAGE_SIZE) {
            assert!(wired.remove(&(base.addr() + offset)), "unwiring unwired va");
        }
    }

    fn unmap(&self, base: VirtAddr, bytes: usize) {
        let mut bound = self.0.bound.lock().unwrap();
        let wired = self.0.wired.lock().unwrap();
        for offset in (0..bytes).step_by(PAGE_SIZE) {
            let va = base.addr() + offset;
            assert!(!wired.contains(&va), "unmapping wired va");
            assert!(bound.remove(&va).is_some(), "unmapping unmapped va");
        }
    }

    fn zero_frame(&self, frame: &TestFrame) {
        let pfn = frame.addr().addr() >> PAGE_SHIFT;
        self.0.zeroed.lock().unwrap().insert(pfn);
    }

    fn refresh_dirty(&self, _frame: &TestFrame) {
        // Dirtiness is preset by the tests.
    }
}

/// Pager recording writebacks and the pin depth it observed.
#[derive(Clone)]
pub(crate) struct StubPager(Arc<PagerState>);

struct PagerState {
    writebacks: AtomicUsize,
    failures: AtomicUsize,
    min_object_refs: AtomicUsize,
}

impl StubPager {
    pub(crate) fn new() -> Self {
        Self(Arc::new(PagerState {
            writebacks: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            min_object_refs: AtomicUsize::new(usize::MAX),
        }))
    }

    pub(crate) fn writebacks(&self) -> usize {
        self.0.writebacks.load(Ordering::Relaxed)
    }

    pub(crate) fn fail_next(&self) {
        self.0.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Smallest `Arc` strong count seen on any written-back object.
    pub(crate) fn min_object_refs(&self) -> usize {
        self.0.min_object_refs.load(Ordering::Relaxed)
    }
}

impl Pager<StdFamily> for StubPager {
    type Error = ();

    fn writeback(
        &self,
        object: &Arc<VmObject<StdFamily>>,
        _frame: &TestFrame,
    ) -> Result<(), ()> {
        self.0.writebacks.fetch_add(1, Ordering::Relaxed);
        self.0
            .min_object_refs
            .fetch_min(Arc::strong_count(object), Ordering::Relaxed);
        if take_failure(&self.0.failures) {
            return Err(());
        }
        Ok(())
    }
}
