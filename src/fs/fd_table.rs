//! File Descriptor Table
//!
//! Per-process mapping from small integer handles to open files.
//!
//! # Design
//! - Handles 0 and 1 are the console and never stored here
//! - Handles are assigned ascending and never reused within a process
//! - Removing an entry hands back the file; dropping it closes it

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::OpenFile;

/// Console input handle.
pub const STDIN_FILENO: i32 = 0;
/// Console output handle.
pub const STDOUT_FILENO: i32 = 1;

/// A process's open files.
pub struct FdTable {
    entries: BTreeMap<i32, Box<dyn OpenFile>>,
    next: i32,
}

impl FdTable {
    /// Create an empty table whose first handle will be `first`.
    pub fn new(first: i32) -> Self {
        Self {
            entries: BTreeMap::new(),
            next: first.max(STDOUT_FILENO + 1),
        }
    }

    /// Store `file` under a fresh handle.
    ///
    /// Hands the file back if the handle space is exhausted.
    pub fn insert(&mut self, file: Box<dyn OpenFile>) -> Result<i32, Box<dyn OpenFile>> {
        let Some(after) = self.next.checked_add(1) else {
            return Err(file);
        };
        let fd = self.next;
        self.next = after;
        self.entries.insert(fd, file);
        Ok(fd)
    }

    /// Look up an open file.
    pub fn get_mut(&mut self, fd: i32) -> Option<&mut (dyn OpenFile + 'static)> {
        self.entries.get_mut(&fd).map(|file| &mut **file)
    }

    /// Remove an entry, returning the file so the caller controls when it closes.
    pub fn remove(&mut self, fd: i32) -> Option<Box<dyn OpenFile>> {
        self.entries.remove(&fd)
    }

    /// Remove every entry, lowest handle first.
    pub fn drain(&mut self) -> Vec<Box<dyn OpenFile>> {
        core::mem::take(&mut self.entries).into_values().collect()
    }

    pub fn contains(&self, fd: i32) -> bool {
        self.entries.contains_key(&fd)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl core::fmt::Debug for FdTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FdTable")
            .field("open", &self.entries.keys().collect::<Vec<_>>())
            .field("next", &self.next)
            .finish()
    }
}
