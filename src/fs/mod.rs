//! Filesystem contract and the global filesystem lock
//!
//! The on-disk filesystem is an external collaborator that is NOT safe for
//! concurrent use. Every method here takes `&mut self`, and the only path
//! to a `&mut dyn FileSystem` is through [`FsLock`], so the type system
//! forces every filesystem touch to hold the lock.
//!
//! Open files live in per-process descriptor tables. Those tables can only
//! be borrowed by presenting an [`FsGuard`] (see
//! [`Process::files`](crate::process::Process::files)), which extends the
//! same guarantee to reads, writes, seeks and closes.

mod fd_table;

use alloc::boxed::Box;
use spin::{Mutex, MutexGuard};

pub use fd_table::{FdTable, STDIN_FILENO, STDOUT_FILENO};

/// A file opened through [`FileSystem::open`].
///
/// Dropping the box closes the file. Drops happen under the lock as well.
pub trait OpenFile: Send {
    /// Size of the file in bytes.
    fn length(&mut self) -> u32;

    /// Read from the current position; returns bytes read.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write at the current position; returns bytes written.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Move the position to `position` bytes from the start.
    fn seek(&mut self, position: u32);

    /// Current position in bytes from the start.
    fn tell(&mut self) -> u32;

    /// Refuse writes to the underlying file through any handle.
    fn deny_write(&mut self);

    /// Re-allow writes previously refused by this handle.
    fn allow_write(&mut self);
}

/// The filesystem implementation.
pub trait FileSystem: Send {
    /// Create `name` with `initial_size` zero bytes. False if it exists or
    /// cannot be created.
    fn create(&mut self, name: &str, initial_size: u32) -> bool;

    /// Delete `name`. Open handles keep working until closed.
    fn remove(&mut self, name: &str) -> bool;

    /// Open `name`.
    fn open(&mut self, name: &str) -> Option<Box<dyn OpenFile>>;
}

/// Proof that the global filesystem lock is held.
pub type FsGuard<'a> = MutexGuard<'a, Box<dyn FileSystem>>;

/// The single lock serializing every filesystem operation.
pub struct FsLock {
    fs: Mutex<Box<dyn FileSystem>>,
}

impl FsLock {
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self { fs: Mutex::new(fs) }
    }

    /// Acquire the lock. It is released when the guard drops, on every path.
    pub fn lock(&self) -> FsGuard<'_> {
        self.fs.lock()
    }

    /// Whether some thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.fs.is_locked()
    }
}

impl core::fmt::Debug for FsLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FsLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
