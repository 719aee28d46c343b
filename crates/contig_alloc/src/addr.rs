use core::fmt;

use super::PAGE_SIZE;

const fn page_roundup(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

const fn page_rounddown(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

struct Hex(usize);
impl fmt::Debug for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

macro_rules! impl_fmt {
    ($ty:ident) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&Hex(self.0)).finish()
            }
        }
        impl fmt::LowerHex for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }
        impl fmt::UpperHex for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::UpperHex::fmt(&self.0, f)
            }
        }
    };
}

/// Physical address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysAddr(usize);
impl_fmt!(PhysAddr);

/// Kernel virtual address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtAddr(usize);
impl_fmt!(VirtAddr);

impl PhysAddr {
    pub const MAX: Self = Self(usize::MAX);
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE == 0
    }

    #[must_use]
    pub const fn page_roundup(self) -> Self {
        Self(page_roundup(self.0))
    }

    #[must_use]
    pub const fn page_rounddown(self) -> Self {
        Self(page_rounddown(self.0))
    }

    /// # Panics
    ///
    /// Panics on physical address overflow.
    #[must_use]
    pub const fn byte_add(self, offset: usize) -> Self {
        let Some(addr) = self.0.checked_add(offset) else {
            panic!("physical address overflow");
        };
        Self(addr)
    }
}

impl VirtAddr {
    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE == 0
    }

    /// # Panics
    ///
    /// Panics on virtual address overflow.
    #[must_use]
    pub const fn byte_add(self, offset: usize) -> Self {
        let Some(addr) = self.0.checked_add(offset) else {
            panic!("virtual address overflow");
        };
        Self(addr)
    }
}
