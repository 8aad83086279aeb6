//! Process Lifecycle Coordinator
//!
//! `exec`, `wait`, `exit` and `halt`.
//!
//! # Ordering guarantees
//! - `exec` returns only after the child reported its load result, or at
//!   once if no thread could be started for it
//! - `exit` stores the status and detaches itself *before* signalling,
//!   so a parent woken by `wait` always reads a final status
//! - `wait` claims the child's record before blocking, so a second `wait`
//!   for the same pid fails instead of blocking

use alloc::format;
use alloc::sync::Arc;

use log::{debug, info, warn};

use super::cmdline::CommandLine;
use super::pcr::{Pid, Process};
use super::spawn::{load_channel, SpawnRequest};
use crate::kernel::Kernel;
use crate::syscall::{Disposition, SyscallError};

impl Kernel {
    /// Start a child of `parent` running `command_line`.
    ///
    /// Spins until the child's image has loaded (or failed to). A spawner
    /// that refuses the request fails the call at once. On failure the
    /// child is unregistered and nothing is left for `wait`.
    pub fn exec(&self, parent: &Arc<Process>, command_line: &str) -> Result<Pid, SyscallError> {
        let command = CommandLine::parse(command_line, self.config()).map_err(|err| {
            debug!("exec({:?}) refused: {}", command_line, err);
            SyscallError::InvalidArgument
        })?;

        let child = Process::new(
            self.allocate_pid(),
            command.program(),
            Some(parent),
            self.config().first_fd,
        );
        let pid = child.pid();
        parent.adopt(Arc::clone(child.exit_record()));
        self.register(Arc::clone(&child));

        let (load, waiter) = load_channel();
        let request = SpawnRequest {
            child: Arc::clone(&child),
            command,
            load,
        };
        if let Err(err) = self.spawner().spawn(request) {
            warn!("exec: no thread for pid {} ({}): {}", pid, child.name(), err);
            self.discard_child(parent, &child);
            return Err(SyscallError::LoadFailed);
        }

        match waiter.wait() {
            Ok(()) => {
                info!("exec: pid {} ({}) started by pid {}", pid, child.name(), parent.pid());
                Ok(pid)
            }
            Err(err) => {
                debug!("exec: pid {} ({}) failed to load: {}", pid, child.name(), err);
                self.discard_child(parent, &child);
                Err(SyscallError::LoadFailed)
            }
        }
    }

    /// Undo everything `exec` set up for a child that never ran.
    fn discard_child(&self, parent: &Process, child: &Process) {
        parent.reap(child.pid());
        self.unregister(child.pid());
        child.clear_parent();
        let fs = self.fs().lock();
        drop(child.take_executable(&fs));
        drop(child.files(&fs).drain());
    }

    /// Wait for direct child `pid` to exit and return its status.
    ///
    /// Fails at once, without blocking, if `pid` is not a direct child of
    /// `parent` or has already been waited for. Otherwise spins on the
    /// child's exit semaphore.
    pub fn wait(&self, parent: &Process, pid: i32) -> Result<i32, SyscallError> {
        let pid = Pid::from_user(pid).ok_or(SyscallError::NotChild)?;
        let record = parent.reap(pid).ok_or(SyscallError::NotChild)?;
        let status = record.wait();
        debug!("wait: pid {} reaped pid {} (status {})", parent.pid(), pid, status);
        Ok(status)
    }

    /// Terminate `process` with `status`.
    ///
    /// Releases every open file and the executable under the filesystem
    /// lock, orphans the process's own children, removes it from the
    /// process table, prints the exit line and finally signals any waiting
    /// parent. A second call for the same process does nothing.
    pub fn exit(&self, process: &Arc<Process>, status: i32) -> Disposition {
        if !process.exit_record().record(status) {
            let recorded = process.exit_status().unwrap_or(status);
            return Disposition::Terminated { status: recorded };
        }

        {
            let fs = self.fs().lock();
            let open = process.files(&fs).drain();
            if !open.is_empty() {
                debug!("exit: pid {} closing {} file(s)", process.pid(), open.len());
            }
            drop(open);
            if let Some(mut image) = process.take_executable(&fs) {
                image.allow_write();
            }
        }

        for pid in process.release_children() {
            if let Some(child) = self.process(pid) {
                child.clear_parent();
            }
        }
        self.unregister(process.pid());
        process.clear_parent();

        let line = format!("{}: exit({})\n", process.name(), status);
        self.console().putbuf(line.as_bytes());

        process.exit_record().signal();
        Disposition::Terminated { status }
    }

    /// Power the machine off. Every later syscall is refused.
    pub fn halt(&self) -> Disposition {
        if self.set_halted() {
            info!("halt: powering off");
            self.machine().power_off();
        }
        Disposition::Halted
    }
}
