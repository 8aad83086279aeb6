//! System call error taxonomy
//!
//! Two classes, kept apart by type:
//! - [`Fault`]: the process handed the kernel something it may not touch.
//!   Always fatal to the caller (exit status -1), never to the kernel.
//! - [`SyscallError`]: the request was well formed but could not be served.
//!   Returned to the caller as a sentinel; the process keeps running.

use core::fmt;

use crate::mm::VirtAddr;

/// A fatal-to-caller validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The syscall number is outside the known range.
    UnknownSyscall(u32),
    /// A pointer argument was null.
    NullPointer,
    /// An address reaches into the kernel half.
    KernelAddress(VirtAddr),
    /// An address lies on a page with no user mapping.
    Unmapped(VirtAddr),
    /// The kernel must store into a page the process cannot write.
    ReadOnly(VirtAddr),
    /// Address arithmetic wrapped around.
    Overflow,
    /// A string ran past the length limit without a terminator.
    Unterminated,
    /// A handler asked for more argument slots than were validated.
    CursorExhausted,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSyscall(nr) => write!(f, "unknown syscall number {}", nr),
            Self::NullPointer => write!(f, "null pointer argument"),
            Self::KernelAddress(addr) => write!(f, "kernel address {}", addr),
            Self::Unmapped(addr) => write!(f, "unmapped address {}", addr),
            Self::ReadOnly(addr) => write!(f, "read-only address {}", addr),
            Self::Overflow => write!(f, "address range wraps"),
            Self::Unterminated => write!(f, "unterminated string"),
            Self::CursorExhausted => write!(f, "argument read past validated slots"),
        }
    }
}

/// A recoverable per-call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// The descriptor is not open in the calling process.
    BadDescriptor,
    /// The file could not be opened.
    NoSuchFile,
    /// The descriptor space of the process is exhausted.
    TooManyFiles,
    /// The executable could not be started.
    LoadFailed,
    /// The pid is not a direct, unreaped child of the caller.
    NotChild,
    /// The argument is well formed but unusable (e.g. an empty command line).
    InvalidArgument,
}

impl SyscallError {
    /// Value stored in the return slot for this failure.
    pub const fn sentinel(self) -> i32 {
        -1
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadDescriptor => write!(f, "bad file descriptor"),
            Self::NoSuchFile => write!(f, "no such file"),
            Self::TooManyFiles => write!(f, "too many open files"),
            Self::LoadFailed => write!(f, "executable failed to load"),
            Self::NotChild => write!(f, "not a waitable child"),
            Self::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}
