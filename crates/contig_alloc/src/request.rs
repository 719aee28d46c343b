use super::PAGE_SIZE;
use crate::addr::PhysAddr;

bitflags::bitflags! {
    /// Allocation request flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocFlags: u32 {
        /// Zero every page before it becomes visible to the caller.
        const ZERO_FILL = 1 << 0;
        /// The request may sleep while memory is reclaimed for it.
        const MAY_BLOCK = 1 << 1;
        /// Single non-blocking probe; never reclaims.
        const NO_WAIT = 1 << 2;
    }
}

/// Identifies the subsystem an allocation is accounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocTag(pub &'static str);

/// Physical placement constraints for a contiguous run.
///
/// A satisfying run starts at `base` with `base % alignment == 0`,
/// lies in `[low, high)`, and, when `boundary` is nonzero, does not cross a
/// `boundary`-aligned physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConstraints {
    pub low: PhysAddr,
    pub high: PhysAddr,
    pub alignment: usize,
    pub boundary: usize,
}

impl RunConstraints {
    /// No placement restriction beyond page alignment.
    pub const ANY: Self = Self {
        low: PhysAddr::ZERO,
        high: PhysAddr::MAX,
        alignment: PAGE_SIZE,
        boundary: 0,
    };

    fn validate(&self) {
        assert!(
            self.alignment.is_power_of_two(),
            "alignment {} is not a power of two",
            self.alignment
        );
        assert!(
            self.boundary == 0 || self.boundary.is_power_of_two(),
            "boundary {} is neither zero nor a power of two",
            self.boundary
        );
        assert!(self.low < self.high, "empty physical window");
    }
}

/// One allocation request. Created per call, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct AllocRequest {
    pub size: usize,
    pub tag: AllocTag,
    pub flags: AllocFlags,
    pub constraints: RunConstraints,
}

impl AllocRequest {
    /// A request without placement constraints.
    #[must_use]
    pub fn new(size: usize, tag: AllocTag, flags: AllocFlags) -> Self {
        Self {
            size,
            tag,
            flags,
            constraints: RunConstraints::ANY,
        }
    }

    pub(crate) fn validate(&self) {
        assert!(self.size > 0, "zero-sized allocation");
        assert!(
            self.flags.contains(AllocFlags::MAY_BLOCK) != self.flags.contains(AllocFlags::NO_WAIT),
            "exactly one of MAY_BLOCK and NO_WAIT must be set"
        );
        self.constraints.validate();
    }

    pub(crate) fn pages(&self) -> usize {
        self.size.div_ceil(PAGE_SIZE)
    }

    /// Probe attempts permitted by the blocking mode.
    pub(crate) fn probe_budget(&self) -> u32 {
        if self.flags.contains(AllocFlags::NO_WAIT) {
            1
        } else {
            3
        }
    }

    pub(crate) fn zero_fill(&self) -> bool {
        self.flags.contains(AllocFlags::ZERO_FILL)
    }
}
