//! Process-management context
//!
//! [`Kernel`] ties the syscall boundary to its collaborators: it owns the
//! filesystem lock, the console and machine handles, the loader, and the
//! table of live processes. Trap entry calls [`Kernel::syscall`] once per
//! system call with the trapping process and its address space.
//!
//! # Waiting
//! `wait` and `exec` block on a [`Semaphore`](crate::sync::Semaphore)
//! that spins on the calling thread. The host scheduler must be preemptive
//! so the child or loader thread that releases it gets CPU time. One
//! waiter spinning on a single core otherwise starves its own wakeup.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::info;
use spin::Mutex;

use crate::config::KernelConfig;
use crate::drivers::{Console, Machine};
use crate::fs::FsLock;
use crate::mm::UserMemory;
use crate::process::{Pid, Process, Spawner};
use crate::syscall::{self, Disposition, TrapFrame};

/// The process-management context shared by every kernel thread.
pub struct Kernel {
    config: KernelConfig,
    fs: Arc<FsLock>,
    console: Arc<dyn Console>,
    machine: Arc<dyn Machine>,
    spawner: Arc<dyn Spawner>,
    processes: Mutex<BTreeMap<Pid, Arc<Process>>>,
    next_pid: AtomicU32,
    halted: AtomicBool,
}

impl Kernel {
    pub fn new(
        config: KernelConfig,
        fs: Arc<FsLock>,
        console: Arc<dyn Console>,
        machine: Arc<dyn Machine>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        Self {
            config,
            fs,
            console,
            machine,
            spawner,
            processes: Mutex::new(BTreeMap::new()),
            next_pid: AtomicU32::new(Pid::FIRST.as_u32()),
            halted: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The global filesystem lock.
    pub fn fs(&self) -> &FsLock {
        &self.fs
    }

    pub fn console(&self) -> &dyn Console {
        &*self.console
    }

    pub(crate) fn machine(&self) -> &dyn Machine {
        &*self.machine
    }

    pub(crate) fn spawner(&self) -> &dyn Spawner {
        &*self.spawner
    }

    /// Create the initial process. It has no parent and nobody waits on it.
    pub fn spawn_root(&self, name: &str) -> Arc<Process> {
        let process = Process::new(self.allocate_pid(), name, None, self.config.first_fd);
        self.register(Arc::clone(&process));
        info!("root process {} ({}) created", process.pid(), name);
        process
    }

    /// Look up a live (not yet exited) process.
    pub fn process(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.lock().get(&pid).cloned()
    }

    /// Number of live processes.
    pub fn live_processes(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Mark the system halted. Returns true for the first caller only.
    pub(crate) fn set_halted(&self) -> bool {
        !self.halted.swap(true, Ordering::AcqRel)
    }

    /// Handle one system call trap from `current`.
    pub fn syscall<M: UserMemory + ?Sized>(
        &self,
        current: &Arc<Process>,
        frame: &mut TrapFrame,
        mem: &mut M,
    ) -> Disposition {
        syscall::dispatch(self, current, frame, mem)
    }

    pub(crate) fn allocate_pid(&self) -> Pid {
        Pid::new(self.next_pid.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, process: Arc<Process>) {
        self.processes.lock().insert(process.pid(), process);
    }

    pub(crate) fn unregister(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.lock().remove(&pid)
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("config", &self.config)
            .field("live_processes", &self.live_processes())
            .field("halted", &self.is_halted())
            .finish()
    }
}
