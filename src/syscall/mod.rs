//! System Call Interface
//!
//! The boundary between unprivileged processes and the kernel.
//!
//! # Security Model
//! - Whitelist approach: only the closed set of syscalls is accepted
//! - The stack pointer and every argument are treated as hostile
//! - All parameters are validated before use
//! - Invalid inputs kill the caller with status -1, never the kernel
//!
//! # Syscalls
//! - 0: halt()
//! - 1: exit(status)
//! - 2: exec(cmd_line) -> pid
//! - 3: wait(pid) -> status
//! - 4: create(name, initial_size) -> bool
//! - 5: remove(name) -> bool
//! - 6: open(name) -> fd
//! - 7: filesize(fd) -> size
//! - 8: read(fd, buf, len) -> count
//! - 9: write(fd, buf, len) -> count
//! - 10: seek(fd, position)
//! - 11: tell(fd) -> position
//! - 12: close(fd)
//! - 13: fibonacci(n) -> int
//! - 14: sum_of_four_integers(a, b, c, d) -> int

pub mod abi;
mod error;
mod file;
mod handler;
pub mod validate;

pub use abi::{numbers, ArgCursor, ArgKind, Syscall, TrapFrame};
pub use error::{Fault, SyscallError};
pub use handler::{dispatch, sys_fibonacci, sys_sum_of_four_integers, Disposition};
pub use validate::{UserBuffer, UserBufferMut};
