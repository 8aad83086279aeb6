//! System Call Handler
//!
//! Decodes a trap into a typed request and dispatches it.
//!
//! # Security Considerations
//! - The syscall number slot is validated before it is read
//! - Unknown syscall numbers terminate the caller
//! - Every argument slot, string and buffer is validated before any
//!   handler runs; buffers are copied through a bounded bounce buffer
//! - A validation failure becomes `exit(-1)`, never a kernel fault

use alloc::string::String;
use alloc::sync::Arc;

use log::{debug, warn};

use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::mm::{UserMemory, VirtAddr, WORD_SIZE};
use crate::process::Process;

use super::abi::{ArgCursor, Syscall, TrapFrame};
use super::error::{Fault, SyscallError};
use super::file;
use super::validate::{self, UserBuffer, UserBufferMut};

/// What trap entry must do once a syscall has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return to the calling process.
    Resume,
    /// The process is gone; tear its thread down.
    Terminated { status: i32 },
    /// The machine is halting; nothing else runs.
    Halted,
}

/// A fully validated system call.
#[derive(Debug)]
enum Request {
    Halt,
    Exit { status: i32 },
    Exec { command_line: String },
    Wait { pid: i32 },
    Create { name: String, initial_size: u32 },
    Remove { name: String },
    Open { name: String },
    Filesize { fd: i32 },
    Read { fd: i32, buf: UserBufferMut },
    Write { fd: i32, buf: UserBuffer },
    Seek { fd: i32, position: u32 },
    Tell { fd: i32 },
    Close { fd: i32 },
    Fibonacci { n: i32 },
    SumOfFourIntegers { a: i32, b: i32, c: i32, d: i32 },
}

impl Request {
    fn syscall(&self) -> Syscall {
        match self {
            Self::Halt => Syscall::Halt,
            Self::Exit { .. } => Syscall::Exit,
            Self::Exec { .. } => Syscall::Exec,
            Self::Wait { .. } => Syscall::Wait,
            Self::Create { .. } => Syscall::Create,
            Self::Remove { .. } => Syscall::Remove,
            Self::Open { .. } => Syscall::Open,
            Self::Filesize { .. } => Syscall::Filesize,
            Self::Read { .. } => Syscall::Read,
            Self::Write { .. } => Syscall::Write,
            Self::Seek { .. } => Syscall::Seek,
            Self::Tell { .. } => Syscall::Tell,
            Self::Close { .. } => Syscall::Close,
            Self::Fibonacci { .. } => Syscall::Fibonacci,
            Self::SumOfFourIntegers { .. } => Syscall::SumOfFourIntegers,
        }
    }
}

/// Read and validate everything a syscall needs from the user stack.
fn decode<M: UserMemory + ?Sized>(
    config: &KernelConfig,
    esp: VirtAddr,
    mem: &M,
) -> Result<Request, Fault> {
    let nr = validate::read_word(mem, esp)?;
    let syscall = Syscall::from_number(nr).ok_or(Fault::UnknownSyscall(nr))?;
    let args_base = esp.checked_add(WORD_SIZE).ok_or(Fault::Overflow)?;
    let mut args = validate::validate_slots(mem, args_base, syscall.slot_count())?;

    let string = |args: &mut ArgCursor| -> Result<String, Fault> {
        let addr = args.next_addr()?;
        validate::read_user_string(mem, addr, config.max_user_string)
    };

    let request = match syscall {
        Syscall::Halt => Request::Halt,
        Syscall::Exit => Request::Exit {
            status: args.next_int()?,
        },
        Syscall::Exec => Request::Exec {
            command_line: string(&mut args)?,
        },
        Syscall::Wait => Request::Wait {
            pid: args.next_int()?,
        },
        Syscall::Create => Request::Create {
            name: string(&mut args)?,
            initial_size: args.next_u32()?,
        },
        Syscall::Remove => Request::Remove {
            name: string(&mut args)?,
        },
        Syscall::Open => Request::Open {
            name: string(&mut args)?,
        },
        Syscall::Filesize => Request::Filesize {
            fd: args.next_int()?,
        },
        Syscall::Read => {
            let fd = args.next_int()?;
            let addr = args.next_addr()?;
            let len = args.next_u32()?;
            Request::Read {
                fd,
                buf: validate::validate_user_write(mem, addr, len)?,
            }
        }
        Syscall::Write => {
            let fd = args.next_int()?;
            let addr = args.next_addr()?;
            let len = args.next_u32()?;
            Request::Write {
                fd,
                buf: validate::validate_user_read(mem, addr, len)?,
            }
        }
        Syscall::Seek => Request::Seek {
            fd: args.next_int()?,
            position: args.next_u32()?,
        },
        Syscall::Tell => Request::Tell {
            fd: args.next_int()?,
        },
        Syscall::Close => Request::Close {
            fd: args.next_int()?,
        },
        Syscall::Fibonacci => Request::Fibonacci {
            n: args.next_int()?,
        },
        Syscall::SumOfFourIntegers => Request::SumOfFourIntegers {
            a: args.next_int()?,
            b: args.next_int()?,
            c: args.next_int()?,
            d: args.next_int()?,
        },
    };
    debug_assert_eq!(args.remaining(), 0, "{} left slots unread", syscall.name());
    Ok(request)
}

/// Dispatch a system call
///
/// # Arguments
/// * `kernel` - Process-management context
/// * `current` - The trapping process
/// * `frame` - Trap frame: stack pointer in, return slot out
/// * `mem` - The trapping process's address space
///
/// # Returns
/// What trap entry must do next
pub fn dispatch<M: UserMemory + ?Sized>(
    kernel: &Kernel,
    current: &Arc<Process>,
    frame: &mut TrapFrame,
    mem: &mut M,
) -> Disposition {
    if kernel.is_halted() {
        return Disposition::Halted;
    }

    let request = match decode(kernel.config(), frame.stack_pointer(), &*mem) {
        Ok(request) => request,
        Err(fault) => {
            warn!(
                "[SYSCALL] pid {} ({}) killed: {}",
                current.pid(),
                current.name(),
                fault
            );
            return kernel.exit(current, -1);
        }
    };

    let syscall = request.syscall();
    debug!("[SYSCALL] pid {}: {}", current.pid(), syscall.name());

    let result = match request {
        Request::Halt => return kernel.halt(),
        Request::Exit { status } => return kernel.exit(current, status),
        Request::Exec { command_line } => kernel
            .exec(current, &command_line)
            .map(|pid| pid.as_i32()),
        Request::Wait { pid } => kernel.wait(current, pid),
        Request::Create { name, initial_size } => Ok(file::sys_create(kernel, &name, initial_size)),
        Request::Remove { name } => Ok(file::sys_remove(kernel, &name)),
        Request::Open { name } => file::sys_open(kernel, current, &name),
        Request::Filesize { fd } => file::sys_filesize(kernel, current, fd),
        Request::Read { fd, buf } => file::sys_read(kernel, current, fd, buf, mem),
        Request::Write { fd, buf } => file::sys_write(kernel, current, fd, buf, &*mem),
        Request::Seek { fd, position } => file::sys_seek(kernel, current, fd, position).map(|()| 0),
        Request::Tell { fd } => file::sys_tell(kernel, current, fd),
        Request::Close { fd } => file::sys_close(kernel, current, fd).map(|()| 0),
        Request::Fibonacci { n } => Ok(sys_fibonacci(n)),
        Request::SumOfFourIntegers { a, b, c, d } => Ok(sys_sum_of_four_integers(a, b, c, d)),
    };

    let value = result.unwrap_or_else(|err: SyscallError| {
        debug!("[SYSCALL] pid {}: {} failed: {}", current.pid(), syscall.name(), err);
        err.sentinel()
    });
    if syscall.returns_value() {
        frame.set_return(value);
    }
    Disposition::Resume
}

/// Fibonacci system call
///
/// Returns the `n`th Fibonacci number, with `fibonacci(1) == 1` and
/// `fibonacci(n) == 0` for `n <= 0`. Wraps on overflow.
pub fn sys_fibonacci(n: i32) -> i32 {
    if n <= 0 {
        return 0;
    }
    let (mut prev, mut current) = (0i32, 1i32);
    for _ in 1..n {
        let next = prev.wrapping_add(current);
        prev = current;
        current = next;
    }
    current
}

/// Sum of four integers system call. Wraps on overflow.
pub fn sys_sum_of_four_integers(a: i32, b: i32, c: i32, d: i32) -> i32 {
    a.wrapping_add(b).wrapping_add(c).wrapping_add(d)
}
