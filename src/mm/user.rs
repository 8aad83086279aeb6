//! User Address Space Access
//!
//! The kernel never owns a process's page tables; the virtual-memory
//! subsystem does. This module defines the narrow contract the syscall
//! boundary consumes from it: page translation for validation, and raw
//! byte copies that are only legal on ranges validation has approved.
//!
//! # Security Properties
//! - Translation is side-effect free and never faults
//! - Copies are `unsafe`: the caller proves the range was validated

use bitflags::bitflags;

use super::address::VirtAddr;

bitflags! {
    /// Attributes of a mapped user page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageFlags: u8 {
        /// The page has a backing frame.
        const PRESENT = 1 << 0;
        /// User code may write the page.
        const WRITABLE = 1 << 1;
        /// User code may access the page at all.
        const USER = 1 << 2;

        /// Ordinary read-only user page (code, rodata).
        const USER_RO = Self::PRESENT.bits() | Self::USER.bits();
        /// Ordinary read-write user page (data, heap, stack).
        const USER_RW = Self::USER_RO.bits() | Self::WRITABLE.bits();
    }
}

/// How the kernel intends to touch a user range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The kernel reads user bytes (syscall arguments, `write` buffers).
    Read,
    /// The kernel stores into user bytes (`read` buffers).
    Write,
}

impl Access {
    /// Flags a page must carry to allow this access.
    #[inline]
    pub const fn required_flags(self) -> PageFlags {
        match self {
            Self::Read => PageFlags::USER_RO,
            Self::Write => PageFlags::USER_RW,
        }
    }
}

/// A process address space as seen from the syscall boundary.
pub trait UserMemory {
    /// Flags of the page containing `page`, or `None` if it is unmapped.
    ///
    /// Must never fault, whatever the address.
    fn translate(&self, page: VirtAddr) -> Option<PageFlags>;

    /// Copy `dst.len()` bytes starting at `addr` into `dst`.
    ///
    /// # Safety
    /// Every byte of `[addr, addr + dst.len())` must have been validated
    /// for [`Access::Read`] against this address space.
    unsafe fn load(&self, addr: VirtAddr, dst: &mut [u8]);

    /// Copy `src` into user memory starting at `addr`.
    ///
    /// # Safety
    /// Every byte of `[addr, addr + src.len())` must have been validated
    /// for [`Access::Write`] against this address space.
    unsafe fn store(&mut self, addr: VirtAddr, src: &[u8]);
}
