//! System call ABI
//!
//! Layout of a syscall on the user stack, 32-bit words throughout:
//!
//! ```text
//!   esp + 0   syscall number
//!   esp + 4   argument slot 0
//!   esp + 8   argument slot 1
//!   ...       (a buffer argument takes two slots: pointer, then length)
//! ```
//!
//! The result, if the call has one, goes into the frame's `eax` slot.

use crate::mm::{VirtAddr, WORD_SIZE};

use super::error::Fault;

/// System call numbers
pub mod numbers {
    pub const SYS_HALT: u32 = 0;
    pub const SYS_EXIT: u32 = 1;
    pub const SYS_EXEC: u32 = 2;
    pub const SYS_WAIT: u32 = 3;
    pub const SYS_CREATE: u32 = 4;
    pub const SYS_REMOVE: u32 = 5;
    pub const SYS_OPEN: u32 = 6;
    pub const SYS_FILESIZE: u32 = 7;
    pub const SYS_READ: u32 = 8;
    pub const SYS_WRITE: u32 = 9;
    pub const SYS_SEEK: u32 = 10;
    pub const SYS_TELL: u32 = 11;
    pub const SYS_CLOSE: u32 = 12;
    pub const SYS_FIBONACCI: u32 = 13;
    pub const SYS_SUM_OF_FOUR_INTEGERS: u32 = 14;
}

/// Most argument slots any syscall takes.
pub const MAX_ARG_SLOTS: usize = 4;

/// The part of the interrupt frame the syscall boundary touches.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// User stack pointer at trap time.
    pub esp: u32,
    /// Return-value register.
    pub eax: u32,
}

impl TrapFrame {
    pub const fn new(esp: u32) -> Self {
        Self { esp, eax: 0 }
    }

    #[inline]
    pub const fn stack_pointer(&self) -> VirtAddr {
        VirtAddr::new(self.esp)
    }

    #[inline]
    pub fn set_return(&mut self, value: i32) {
        self.eax = value as u32;
    }

    #[inline]
    pub const fn return_value(&self) -> i32 {
        self.eax as i32
    }
}

/// How one argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A plain integer in one slot.
    Int,
    /// Pointer to a NUL-terminated string, one slot.
    Str,
    /// Pointer + length of bytes the kernel reads, two slots.
    Buffer,
    /// Pointer + length of bytes the kernel writes, two slots.
    BufferMut,
}

impl ArgKind {
    /// Stack slots this argument occupies.
    pub const fn slots(self) -> u32 {
        match self {
            Self::Int | Self::Str => 1,
            Self::Buffer | Self::BufferMut => 2,
        }
    }
}

/// The closed set of system calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Syscall {
    Halt = numbers::SYS_HALT,
    Exit = numbers::SYS_EXIT,
    Exec = numbers::SYS_EXEC,
    Wait = numbers::SYS_WAIT,
    Create = numbers::SYS_CREATE,
    Remove = numbers::SYS_REMOVE,
    Open = numbers::SYS_OPEN,
    Filesize = numbers::SYS_FILESIZE,
    Read = numbers::SYS_READ,
    Write = numbers::SYS_WRITE,
    Seek = numbers::SYS_SEEK,
    Tell = numbers::SYS_TELL,
    Close = numbers::SYS_CLOSE,
    Fibonacci = numbers::SYS_FIBONACCI,
    SumOfFourIntegers = numbers::SYS_SUM_OF_FOUR_INTEGERS,
}

impl Syscall {
    /// Every syscall, in number order.
    pub const ALL: [Self; 15] = [
        Self::Halt,
        Self::Exit,
        Self::Exec,
        Self::Wait,
        Self::Create,
        Self::Remove,
        Self::Open,
        Self::Filesize,
        Self::Read,
        Self::Write,
        Self::Seek,
        Self::Tell,
        Self::Close,
        Self::Fibonacci,
        Self::SumOfFourIntegers,
    ];

    /// Decode a syscall number; `None` if it is outside the closed range.
    pub const fn from_number(nr: u32) -> Option<Self> {
        if (nr as usize) < Self::ALL.len() {
            Some(Self::ALL[nr as usize])
        } else {
            None
        }
    }

    #[inline]
    pub const fn number(self) -> u32 {
        self as u32
    }

    /// Argument layout, in stack order.
    pub const fn signature(self) -> &'static [ArgKind] {
        use ArgKind::*;
        match self {
            Self::Halt => &[],
            Self::Exit | Self::Wait | Self::Filesize | Self::Tell | Self::Close => &[Int],
            Self::Fibonacci => &[Int],
            Self::Exec | Self::Remove | Self::Open => &[Str],
            Self::Create => &[Str, Int],
            Self::Read => &[Int, BufferMut],
            Self::Write => &[Int, Buffer],
            Self::Seek => &[Int, Int],
            Self::SumOfFourIntegers => &[Int, Int, Int, Int],
        }
    }

    /// Stack slots the arguments occupy.
    pub const fn slot_count(self) -> u32 {
        let signature = self.signature();
        let mut slots = 0;
        let mut i = 0;
        while i < signature.len() {
            slots += signature[i].slots();
            i += 1;
        }
        slots
    }

    /// Whether the call stores a result in the return slot.
    pub const fn returns_value(self) -> bool {
        !matches!(self, Self::Halt | Self::Exit | Self::Seek | Self::Close)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Exit => "exit",
            Self::Exec => "exec",
            Self::Wait => "wait",
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Open => "open",
            Self::Filesize => "filesize",
            Self::Read => "read",
            Self::Write => "write",
            Self::Seek => "seek",
            Self::Tell => "tell",
            Self::Close => "close",
            Self::Fibonacci => "fibonacci",
            Self::SumOfFourIntegers => "sum_of_four_integers",
        }
    }
}

/// Typed reader over argument slots that have already been validated.
///
/// The slots are copied into the kernel when the cursor is built, so
/// reading through it never touches user memory. Asking for more slots
/// than were validated is an error, not an out-of-bounds read.
#[derive(Debug, Clone)]
pub struct ArgCursor {
    base: VirtAddr,
    words: [u32; MAX_ARG_SLOTS],
    len: usize,
    pos: usize,
}

impl ArgCursor {
    /// Only the validator builds cursors, from words it has copied in.
    pub(super) fn from_validated(base: VirtAddr, words: &[u32]) -> Result<Self, Fault> {
        if words.len() > MAX_ARG_SLOTS {
            return Err(Fault::CursorExhausted);
        }
        let mut copy = [0; MAX_ARG_SLOTS];
        copy[..words.len()].copy_from_slice(words);
        Ok(Self {
            base,
            words: copy,
            len: words.len(),
            pos: 0,
        })
    }

    /// Next slot as a raw word.
    pub fn next_word(&mut self) -> Result<u32, Fault> {
        if self.pos >= self.len {
            return Err(Fault::CursorExhausted);
        }
        let word = self.words[self.pos];
        self.pos += 1;
        Ok(word)
    }

    /// Next slot as a signed integer.
    pub fn next_int(&mut self) -> Result<i32, Fault> {
        self.next_word().map(|word| word as i32)
    }

    /// Next slot as an unsigned integer (sizes, positions).
    pub fn next_u32(&mut self) -> Result<u32, Fault> {
        self.next_word()
    }

    /// Next slot as a user pointer. The pointee is NOT validated yet.
    pub fn next_addr(&mut self) -> Result<VirtAddr, Fault> {
        self.next_word().map(VirtAddr::new)
    }

    /// Address of the slot the next read would return.
    pub fn position(&self) -> Option<VirtAddr> {
        self.base.checked_add(self.pos as u32 * WORD_SIZE)
    }

    /// Validated slots not read yet.
    pub fn remaining(&self) -> usize {
        self.len - self.pos
    }
}
