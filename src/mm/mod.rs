//! Memory management interface for the syscall boundary
//!
//! Provides:
//! - User virtual address types and the kernel/user split
//! - The address-space contract consumed from the VM subsystem
//!
//! # Security Principles
//! - User addresses are opaque until validated
//! - Every copy across the boundary goes through [`UserMemory`]

pub mod address;
pub mod user;

pub use address::{VirtAddr, PAGE_SIZE, PHYS_BASE, WORD_SIZE};
pub use user::{Access, PageFlags, UserMemory};
