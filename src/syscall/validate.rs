//! System Call Input Validation
//!
//! Proves user-supplied addresses safe before the kernel touches them.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: deny by default
//! - Check the full extent of every range, one page at a time. Checking
//!   only the first byte of a buffer is exactly the bug this module exists
//!   to prevent.
//! - Copy to kernel space before use (no check/use races)
//!
//! Validation is an eager page walk: every page a range touches is looked
//! up in the address space before a single byte is copied. A failed walk
//! is a [`Fault`], which the dispatcher turns into `exit(-1)`.

use alloc::string::String;
use alloc::vec::Vec;

use crate::mm::{Access, UserMemory, VirtAddr, PAGE_SIZE, WORD_SIZE};

use super::abi::{ArgCursor, MAX_ARG_SLOTS};
use super::error::Fault;

/// A validated user-space buffer the kernel may read.
///
/// Only constructed after validation passes. It records the range, not a
/// borrow of the address space, so it must be used with the same address
/// space it was validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBuffer {
    addr: VirtAddr,
    len: u32,
}

impl UserBuffer {
    pub fn addr(&self) -> VirtAddr {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy up to `dst.len()` bytes starting `offset` bytes into the buffer.
    ///
    /// Returns bytes copied; zero once `offset` reaches the end.
    pub fn read_at<M: UserMemory + ?Sized>(&self, mem: &M, offset: usize, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.len().saturating_sub(offset));
        if count > 0 {
            // SAFETY:
            // - offset + count <= len, so the range is inside the buffer
            // - Every page was mapped user-readable in validate_user_read
            unsafe { mem.load(self.addr.offset(offset), &mut dst[..count]) };
        }
        count
    }
}

/// A validated user-space buffer the kernel may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBufferMut {
    addr: VirtAddr,
    len: u32,
}

impl UserBufferMut {
    pub fn addr(&self) -> VirtAddr {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `data` to the start of the buffer; anything past its end is dropped.
    ///
    /// Returns bytes copied.
    pub fn copy_out<M: UserMemory + ?Sized>(&self, mem: &mut M, data: &[u8]) -> usize {
        self.write_at(mem, 0, data)
    }

    /// Copy `data` to `offset` bytes into the buffer, dropping whatever
    /// does not fit. Returns bytes copied.
    pub fn write_at<M: UserMemory + ?Sized>(&self, mem: &mut M, offset: usize, data: &[u8]) -> usize {
        let count = data.len().min(self.len().saturating_sub(offset));
        if count > 0 {
            // SAFETY:
            // - offset + count <= len, so the range is inside the buffer
            // - Every page was mapped user-writable in validate_user_write
            unsafe { mem.store(self.addr.offset(offset), &data[..count]) };
        }
        count
    }
}

/// Check that every page of `[addr, addr + len)` is user memory mapped for `access`.
///
/// # Security Checks
/// 1. Pointer + length doesn't overflow
/// 2. The last byte is below the kernel/user split
/// 3. Every page in between is mapped with the required flags
pub fn check_range<M: UserMemory + ?Sized>(
    mem: &M,
    addr: VirtAddr,
    len: u32,
    access: Access,
) -> Result<(), Fault> {
    let pages = addr.pages(len).ok_or(Fault::Overflow)?;
    if !addr.range_is_user(len) {
        return Err(Fault::KernelAddress(addr));
    }
    let required = access.required_flags();
    for page in pages {
        let flags = mem.translate(page).ok_or(Fault::Unmapped(page))?;
        if !flags.contains(Access::Read.required_flags()) {
            return Err(Fault::Unmapped(page));
        }
        if !flags.contains(required) {
            return Err(Fault::ReadOnly(page));
        }
    }
    Ok(())
}

/// Validate `count` argument slots starting at `base` and copy them in.
pub fn validate_slots<M: UserMemory + ?Sized>(
    mem: &M,
    base: VirtAddr,
    count: u32,
) -> Result<ArgCursor, Fault> {
    if count as usize > MAX_ARG_SLOTS {
        return Err(Fault::CursorExhausted);
    }
    if count == 0 {
        return ArgCursor::from_validated(base, &[]);
    }
    let len = count.checked_mul(WORD_SIZE).ok_or(Fault::Overflow)?;
    check_range(mem, base, len, Access::Read)?;

    let mut raw = [0u8; MAX_ARG_SLOTS * WORD_SIZE as usize];
    let raw = &mut raw[..len as usize];
    // SAFETY: check_range just approved every byte of [base, base + len)
    unsafe { mem.load(base, raw) };

    let mut words = [0u32; MAX_ARG_SLOTS];
    for (word, bytes) in words.iter_mut().zip(raw.chunks_exact(WORD_SIZE as usize)) {
        *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    ArgCursor::from_validated(base, &words[..count as usize])
}

/// Read the word at `addr` (the syscall number slot).
pub fn read_word<M: UserMemory + ?Sized>(mem: &M, addr: VirtAddr) -> Result<u32, Fault> {
    validate_slots(mem, addr, 1)?.next_word()
}

/// Validate a user-space read buffer.
///
/// Zero-length buffers are valid whatever the pointer and touch nothing.
pub fn validate_user_read<M: UserMemory + ?Sized>(
    mem: &M,
    addr: VirtAddr,
    len: u32,
) -> Result<UserBuffer, Fault> {
    if len == 0 {
        return Ok(UserBuffer { addr, len });
    }
    if addr.is_null() {
        return Err(Fault::NullPointer);
    }
    check_range(mem, addr, len, Access::Read)?;
    Ok(UserBuffer { addr, len })
}

/// Validate a user-space write buffer.
///
/// Same as read validation, plus every page must be writable.
pub fn validate_user_write<M: UserMemory + ?Sized>(
    mem: &M,
    addr: VirtAddr,
    len: u32,
) -> Result<UserBufferMut, Fault> {
    if len == 0 {
        return Ok(UserBufferMut { addr, len });
    }
    if addr.is_null() {
        return Err(Fault::NullPointer);
    }
    check_range(mem, addr, len, Access::Write)?;
    Ok(UserBufferMut { addr, len })
}

/// Bytes of a user string examined per step.
const SCAN_LEN: u32 = 64;

/// Validate and copy in a NUL-terminated user string.
///
/// Walks the string in steps of at most [`SCAN_LEN`] bytes that never
/// cross a page: each step's page is validated before any byte on it is
/// read, so a string running off the end of mapped memory faults at the
/// first unmapped page instead of being read blindly. Bytes that are not
/// UTF-8 are replaced, which cannot match any real file or program name.
pub fn read_user_string<M: UserMemory + ?Sized>(
    mem: &M,
    addr: VirtAddr,
    max_len: u32,
) -> Result<String, Fault> {
    if addr.is_null() {
        return Err(Fault::NullPointer);
    }

    let mut bytes = Vec::new();
    let mut scan = [0u8; SCAN_LEN as usize];
    let mut cursor = addr;
    loop {
        let span = (PAGE_SIZE - cursor.page_offset()).min(SCAN_LEN);
        check_range(mem, cursor, span, Access::Read)?;
        let chunk = &mut scan[..span as usize];
        // SAFETY:
        // - [cursor, cursor + span) was just validated user-readable
        // - `span` stops at the end of the page
        unsafe { mem.load(cursor, chunk) };

        let terminator = chunk.iter().position(|&b| b == 0);
        let taken = terminator.unwrap_or(chunk.len());
        if bytes.len() + taken > max_len as usize {
            return Err(Fault::Unterminated);
        }
        bytes.extend_from_slice(&chunk[..taken]);
        if terminator.is_some() {
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        cursor = cursor.checked_add(span).ok_or(Fault::Overflow)?;
    }
}
