//! Process Control Record
//!
//! Per-process kernel bookkeeping.
//!
//! # Ownership
//! ```text
//!   parent ──owns──▶ children: Pid → Arc<ExitRecord> ◀──shares── child
//!   child  ──weak──▶ parent  (cleared when the parent exits)
//! ```
//! The parent never owns the child's PCR, only its exit record. The
//! record outlives the child's PCR so a parent can reap a child that
//! exited long before `wait` was called.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;

use spin::{Mutex, MutexGuard};

use crate::fs::{FdTable, FsGuard, OpenFile};
use crate::sync::Semaphore;

/// A process identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// The first pid handed out.
    pub const FIRST: Self = Self(1);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Interpret a pid passed in from user space.
    pub const fn from_user(raw: i32) -> Option<Self> {
        if raw > 0 {
            Some(Self(raw as u32))
        } else {
            None
        }
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The pid as the syscall ABI returns it.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Termination state of one process, shared between it and its parent.
pub struct ExitRecord {
    pid: Pid,
    status: Mutex<Option<i32>>,
    exited: Semaphore,
}

impl ExitRecord {
    fn new(pid: Pid) -> Self {
        Self {
            pid,
            status: Mutex::new(None),
            exited: Semaphore::new(0),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Exit status, once the process has exited.
    pub fn status(&self) -> Option<i32> {
        *self.status.lock()
    }

    /// Store the exit status. Returns false if one was already stored.
    pub(crate) fn record(&self, status: i32) -> bool {
        let mut slot = self.status.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(status);
        true
    }

    /// Announce termination. Called exactly once, after [`Self::record`].
    pub(crate) fn signal(&self) {
        self.exited.up();
    }

    /// Block until the process has exited, then return its status.
    ///
    /// The semaphore keeps an early `signal`, so this returns at once for
    /// a process that is already gone.
    pub(crate) fn wait(&self) -> i32 {
        self.exited.down();
        self.status().unwrap_or(-1)
    }
}

impl fmt::Debug for ExitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitRecord")
            .field("pid", &self.pid)
            .field("status", &self.status())
            .finish()
    }
}

/// Process Control Record.
pub struct Process {
    pid: Pid,
    name: String,
    parent: Mutex<Option<Weak<Process>>>,
    children: Mutex<BTreeMap<Pid, Arc<ExitRecord>>>,
    exit: Arc<ExitRecord>,
    files: Mutex<FdTable>,
    executable: Mutex<Option<Box<dyn OpenFile>>>,
}

impl Process {
    pub(crate) fn new(
        pid: Pid,
        name: &str,
        parent: Option<&Arc<Process>>,
        first_fd: i32,
    ) -> Arc<Self> {
        Arc::new(Self {
            pid,
            name: String::from(name),
            parent: Mutex::new(parent.map(Arc::downgrade)),
            children: Mutex::new(BTreeMap::new()),
            exit: Arc::new(ExitRecord::new(pid)),
            files: Mutex::new(FdTable::new(first_fd)),
            executable: Mutex::new(None),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Program name, as printed in the exit line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent, if it is still around.
    pub fn parent(&self) -> Option<Arc<Process>> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Whether a parent link is still recorded (it is cleared on orphaning).
    pub fn has_parent_link(&self) -> bool {
        self.parent.lock().is_some()
    }

    pub(crate) fn clear_parent(&self) {
        *self.parent.lock() = None;
    }

    pub fn exit_record(&self) -> &Arc<ExitRecord> {
        &self.exit
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.exit.status()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_status().is_some()
    }

    /// Whether `pid` is a direct child that has not been reaped.
    pub fn is_child(&self, pid: Pid) -> bool {
        self.children.lock().contains_key(&pid)
    }

    pub fn child_pids(&self) -> Vec<Pid> {
        self.children.lock().keys().copied().collect()
    }

    pub(crate) fn adopt(&self, record: Arc<ExitRecord>) {
        self.children.lock().insert(record.pid(), record);
    }

    /// Take a child's record out of the collection. At most one caller
    /// ever gets `Some` for a given pid.
    pub(crate) fn reap(&self, pid: Pid) -> Option<Arc<ExitRecord>> {
        self.children.lock().remove(&pid)
    }

    /// Drop every child record, returning the pids that were held.
    pub(crate) fn release_children(&self) -> Vec<Pid> {
        let children = core::mem::take(&mut *self.children.lock());
        children.into_keys().collect()
    }

    /// Borrow the descriptor table. Requires the filesystem lock.
    pub fn files<'a>(&'a self, _fs: &FsGuard<'_>) -> MutexGuard<'a, FdTable> {
        self.files.lock()
    }

    /// Keep the running executable open and write-protected until exit.
    pub fn set_executable(&self, mut file: Box<dyn OpenFile>, _fs: &FsGuard<'_>) {
        file.deny_write();
        if let Some(mut previous) = self.executable.lock().replace(file) {
            previous.allow_write();
        }
    }

    pub(crate) fn take_executable(&self, _fs: &FsGuard<'_>) -> Option<Box<dyn OpenFile>> {
        self.executable.lock().take()
    }

    pub fn has_executable(&self) -> bool {
        self.executable.lock().is_some()
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("exit_status", &self.exit_status())
            .field("children", &self.child_pids())
            .finish()
    }
}
