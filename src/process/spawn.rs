//! Loader contract
//!
//! Creating a thread and loading an executable image are external
//! services. `exec` hands them a [`SpawnRequest`] and then blocks until
//! the new thread reports through its [`LoadReporter`] whether the image
//! loaded. The caller of `exec` therefore never sees a pid for a child
//! that failed to load.
//!
//! A reporter dropped without reporting counts as a failed load, so a
//! loader that bails out early cannot leave `exec` blocked forever.

use alloc::sync::Arc;
use core::fmt;

use spin::Mutex;

use super::cmdline::CommandLine;
use super::pcr::Process;
use crate::sync::Semaphore;

/// Why an executable failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// No file by that name.
    NotFound,
    /// The file is not a valid executable image.
    BadImage,
    /// The loader went away without reporting.
    Abandoned,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "executable not found"),
            Self::BadImage => write!(f, "invalid executable image"),
            Self::Abandoned => write!(f, "loader exited without reporting"),
        }
    }
}

/// Why no thread could be started for a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The scheduler has no room for another thread.
    NoThread,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoThread => write!(f, "no thread available"),
        }
    }
}

/// Everything the loader needs to start a child.
pub struct SpawnRequest {
    /// The child's PCR, already registered with its parent.
    pub child: Arc<Process>,
    /// Parsed command line; `command.program()` names the executable.
    pub command: CommandLine,
    /// One-shot load result channel back to the blocked `exec`.
    pub load: LoadReporter,
}

/// Thread creation + image loading.
///
/// The spawned thread loads `request.command.program()`, reports through
/// `request.load`, and on success starts running user code. After a
/// failed load the thread must end without running user code and without
/// calling [`Kernel::exit`](crate::Kernel::exit).
///
/// Returning `Err` means no thread will run the request. `exec` fails at
/// once without waiting on `request.load`, so an implementation may still
/// be holding the request when it returns.
pub trait Spawner: Send + Sync {
    fn spawn(&self, request: SpawnRequest) -> Result<(), SpawnError>;
}

struct LoadSlot {
    outcome: Mutex<Option<Result<(), LoadError>>>,
    ready: Semaphore,
}

/// Sending half of the load-result channel.
pub struct LoadReporter {
    slot: Option<Arc<LoadSlot>>,
}

impl LoadReporter {
    /// The image loaded; the parent may return the child's pid.
    pub fn succeed(mut self) {
        self.report(Ok(()));
    }

    /// The image did not load; the parent's `exec` returns -1.
    pub fn fail(mut self, error: LoadError) {
        self.report(Err(error));
    }

    fn report(&mut self, outcome: Result<(), LoadError>) {
        if let Some(slot) = self.slot.take() {
            *slot.outcome.lock() = Some(outcome);
            slot.ready.up();
        }
    }
}

impl Drop for LoadReporter {
    fn drop(&mut self) {
        self.report(Err(LoadError::Abandoned));
    }
}

/// Receiving half of the load-result channel.
pub(crate) struct LoadWaiter {
    slot: Arc<LoadSlot>,
}

impl LoadWaiter {
    /// Block until the loader reports.
    pub(crate) fn wait(self) -> Result<(), LoadError> {
        self.slot.ready.down();
        self.slot
            .outcome
            .lock()
            .take()
            .unwrap_or(Err(LoadError::Abandoned))
    }
}

pub(crate) fn load_channel() -> (LoadReporter, LoadWaiter) {
    let slot = Arc::new(LoadSlot {
        outcome: Mutex::new(None),
        ready: Semaphore::new(0),
    });
    (
        LoadReporter {
            slot: Some(Arc::clone(&slot)),
        },
        LoadWaiter { slot },
    )
}
