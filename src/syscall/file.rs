//! File system calls
//!
//! Every handler here runs with its arguments already validated. Each one
//! takes the global filesystem lock for the whole of its filesystem work,
//! and only ever looks descriptors up in the calling process's own table.
//! Kernel memory used for a transfer is bounded by [`BOUNCE_LEN`], never by
//! the length the caller passed.

use alloc::vec;

use crate::drivers::console;
use crate::fs::{STDIN_FILENO, STDOUT_FILENO};
use crate::kernel::Kernel;
use crate::mm::{UserMemory, PAGE_SIZE};
use crate::process::Process;

use super::error::SyscallError;
use super::validate::{UserBuffer, UserBufferMut};

/// Largest kernel buffer a single read or write allocates.
pub(super) const BOUNCE_LEN: usize = PAGE_SIZE as usize;

fn count(bytes: usize) -> i32 {
    i32::try_from(bytes).unwrap_or(i32::MAX)
}

/// Create a file. Returns 1 on success, 0 if the filesystem refused.
pub(super) fn sys_create(kernel: &Kernel, name: &str, initial_size: u32) -> i32 {
    let mut fs = kernel.fs().lock();
    i32::from(fs.create(name, initial_size))
}

/// Remove a file. Returns 1 on success, 0 if the filesystem refused.
pub(super) fn sys_remove(kernel: &Kernel, name: &str) -> i32 {
    let mut fs = kernel.fs().lock();
    i32::from(fs.remove(name))
}

pub(super) fn sys_open(kernel: &Kernel, current: &Process, name: &str) -> Result<i32, SyscallError> {
    let mut fs = kernel.fs().lock();
    let file = fs.open(name).ok_or(SyscallError::NoSuchFile)?;
    let fd = current
        .files(&fs)
        .insert(file)
        .map_err(|_| SyscallError::TooManyFiles)?;
    Ok(fd)
}

pub(super) fn sys_filesize(kernel: &Kernel, current: &Process, fd: i32) -> Result<i32, SyscallError> {
    let fs = kernel.fs().lock();
    let mut files = current.files(&fs);
    let file = files.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;
    Ok(file.length() as i32)
}

/// Read system call
///
/// `fd == 0` reads console input one key at a time until a newline has
/// been read or the buffer is full. Other descriptors read from the file.
/// The descriptor is resolved before anything is allocated, and data moves
/// through a bounce buffer of at most [`BOUNCE_LEN`] bytes.
///
/// # Returns
/// Number of bytes stored in the user buffer
pub(super) fn sys_read<M: UserMemory + ?Sized>(
    kernel: &Kernel,
    current: &Process,
    fd: i32,
    buf: UserBufferMut,
    mem: &mut M,
) -> Result<i32, SyscallError> {
    if fd == STDIN_FILENO {
        let mut done = 0;
        while done < buf.len() {
            let line = console::read_line(kernel.console(), (buf.len() - done).min(BOUNCE_LEN));
            done += buf.write_at(mem, done, &line);
            if line.last() == Some(&b'\n') {
                break;
            }
        }
        return Ok(count(done));
    }
    if fd == STDOUT_FILENO {
        return Err(SyscallError::BadDescriptor);
    }

    let fs = kernel.fs().lock();
    let mut files = current.files(&fs);
    let file = files.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;

    let mut bounce = vec![0; buf.len().min(BOUNCE_LEN)];
    let mut done = 0;
    while done < buf.len() {
        let want = (buf.len() - done).min(bounce.len());
        let got = file.read(&mut bounce[..want]).min(want);
        done += buf.write_at(mem, done, &bounce[..got]);
        if got < want {
            break;
        }
    }
    Ok(count(done))
}

/// Write system call
///
/// `fd == 1` goes straight to the console. A write to a file holds the
/// filesystem lock across every chunk, so concurrent writers never
/// interleave partial writes.
///
/// # Returns
/// Number of bytes written
pub(super) fn sys_write<M: UserMemory + ?Sized>(
    kernel: &Kernel,
    current: &Process,
    fd: i32,
    buf: UserBuffer,
    mem: &M,
) -> Result<i32, SyscallError> {
    if fd == STDOUT_FILENO {
        let mut bounce = vec![0; buf.len().min(BOUNCE_LEN)];
        let mut done = 0;
        loop {
            let chunk = buf.read_at(mem, done, &mut bounce);
            if chunk == 0 {
                break;
            }
            kernel.console().putbuf(&bounce[..chunk]);
            done += chunk;
        }
        return Ok(count(done));
    }
    if fd == STDIN_FILENO {
        return Err(SyscallError::BadDescriptor);
    }

    let fs = kernel.fs().lock();
    let mut files = current.files(&fs);
    let file = files.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;

    let mut bounce = vec![0; buf.len().min(BOUNCE_LEN)];
    let mut done = 0;
    loop {
        let chunk = buf.read_at(mem, done, &mut bounce);
        if chunk == 0 {
            break;
        }
        let wrote = file.write(&bounce[..chunk]).min(chunk);
        done += wrote;
        if wrote < chunk {
            break;
        }
    }
    Ok(count(done))
}

pub(super) fn sys_seek(
    kernel: &Kernel,
    current: &Process,
    fd: i32,
    position: u32,
) -> Result<(), SyscallError> {
    let fs = kernel.fs().lock();
    let mut files = current.files(&fs);
    let file = files.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;
    file.seek(position);
    Ok(())
}

pub(super) fn sys_tell(kernel: &Kernel, current: &Process, fd: i32) -> Result<i32, SyscallError> {
    let fs = kernel.fs().lock();
    let mut files = current.files(&fs);
    let file = files.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;
    Ok(file.tell() as i32)
}

/// Close system call
///
/// Closing a descriptor that is not open (including 0 and 1) is a no-op
/// for the caller; the error only reaches the log.
pub(super) fn sys_close(kernel: &Kernel, current: &Process, fd: i32) -> Result<(), SyscallError> {
    let fs = kernel.fs().lock();
    let file = current.files(&fs).remove(fd);
    match file {
        Some(file) => {
            drop(file);
            Ok(())
        }
        None => Err(SyscallError::BadDescriptor),
    }
}
