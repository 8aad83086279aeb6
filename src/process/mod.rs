//! Processes
//!
//! - [`Process`]: the Process Control Record
//! - [`CommandLine`]: `exec` argument parsing
//! - [`Spawner`]: the loader contract `exec` depends on
//! - lifecycle: `exec`, `wait`, `exit`, `halt` on [`Kernel`](crate::Kernel)

mod cmdline;
mod lifecycle;
mod pcr;
mod spawn;

pub use cmdline::{CommandLine, CommandLineError};
pub use pcr::{ExitRecord, Pid, Process};
pub use spawn::{LoadError, LoadReporter, SpawnError, SpawnRequest, Spawner};
