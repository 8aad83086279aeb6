//! User Virtual Address Types
//!
//! Type-safe wrapper for addresses handed to the kernel by user code.
//! The syscall ABI is 32-bit: every argument slot is one 4-byte word and
//! every pointer a process passes is a 32-bit virtual address.
//!
//! # Security Properties
//! - User addresses cannot be dereferenced directly
//! - All arithmetic is overflow-checked
//! - The kernel/user split is a single constant checked in one place

use core::fmt;

/// Page size (4 KiB)
pub const PAGE_SIZE: u32 = 4096;
/// Page size mask
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;
/// Bits to shift for page number
pub const PAGE_SHIFT: u32 = 12;

/// Base of the kernel half of the address space.
///
/// Every user-addressable byte lies strictly below this address.
pub const PHYS_BASE: u32 = 0xC000_0000;

/// Width of one argument slot on the user stack.
pub const WORD_SIZE: u32 = 4;

/// A user virtual address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(u32);

impl VirtAddr {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Wrap a raw address taken from a register or a stack slot.
    #[inline]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// Align the address down to the nearest page boundary.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Get the page offset (lowest 12 bits).
    #[inline]
    pub const fn page_offset(self) -> u32 {
        self.0 & PAGE_MASK
    }

    /// Get the virtual page number.
    #[inline]
    pub const fn page_number(self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    /// Add an offset, failing on wrap-around.
    #[inline]
    pub const fn checked_add(self, offset: u32) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Step `bytes` into a range already known not to wrap.
    #[inline]
    pub const fn offset(self, bytes: usize) -> Self {
        Self(self.0.wrapping_add(bytes as u32))
    }

    /// Check if this address is below the kernel/user split.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 < PHYS_BASE
    }

    /// Check if this address belongs to the kernel half.
    #[inline]
    pub const fn is_kernel(self) -> bool {
        !self.is_user()
    }

    /// Iterate over the pages covering `[self, self + len)`.
    ///
    /// Returns `None` if the range wraps around the address space.
    /// A zero-length range touches no page.
    pub fn pages(self, len: u32) -> Option<Pages> {
        if len == 0 {
            return Some(Pages { next: 0, last: 0, done: true });
        }
        let last_byte = self.0.checked_add(len - 1)?;
        Some(Pages {
            next: self.0 & !PAGE_MASK,
            last: last_byte & !PAGE_MASK,
            done: false,
        })
    }

    /// Check that `[self, self + len)` lies entirely in user space.
    pub fn range_is_user(self, len: u32) -> bool {
        match len.checked_sub(1) {
            None => self.is_user(),
            Some(extent) => match self.0.checked_add(extent) {
                Some(last) => Self(last).is_user(),
                None => false,
            },
        }
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Page-aligned addresses covering a byte range, lowest first.
#[derive(Debug, Clone)]
pub struct Pages {
    next: u32,
    last: u32,
    done: bool,
}

impl Iterator for Pages {
    type Item = VirtAddr;

    fn next(&mut self) -> Option<VirtAddr> {
        if self.done {
            return None;
        }
        let page = self.next;
        if page == self.last {
            self.done = true;
        } else {
            self.next += PAGE_SIZE;
        }
        Some(VirtAddr(page))
    }
}
