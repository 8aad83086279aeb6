//! sysgate - System call boundary for a teaching kernel
//!
//! The layer between a trapping user process and the kernel's services.
//!
//! # Responsibilities
//! - Validate the user stack pointer and every argument before use
//! - Dispatch the closed set of syscalls to their handlers
//! - Coordinate process creation, waiting and termination
//! - Serialize all filesystem access behind one lock
//!
//! # Security Features
//! - Eager page-walk validation of every slot, string and buffer
//! - Typed argument cursor instead of raw stack offsets
//! - Bad user input kills the process, never the kernel
//! - Filesystem access is only reachable while holding the lock
//!
//! # Collaborators
//! Scheduling, virtual memory, the filesystem, devices and image loading
//! are external. They are consumed through [`mm::UserMemory`],
//! [`fs::FileSystem`], [`drivers::Console`], [`drivers::Machine`] and
//! [`process::Spawner`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod fs;
mod kernel;
pub mod logger;
pub mod mm;
pub mod process;
pub mod sync;
pub mod syscall;

#[cfg(test)]
mod testing;

pub use config::KernelConfig;
pub use kernel::Kernel;
pub use process::{Pid, Process};
pub use syscall::{Disposition, TrapFrame};
