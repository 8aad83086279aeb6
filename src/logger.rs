//! Kernel logger
//!
//! Routes the `log` facade to a [`Console`], one line per record:
//!
//! ```text
//! [WARN] sysgate::syscall::handler: [SYSCALL] pid 3 (child) killed: null pointer argument
//! ```
//!
//! The exit line processes print is NOT a log record; it goes to the
//! console directly and is never filtered.

use alloc::format;
use alloc::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::drivers::Console;

/// A `log` backend writing to the console.
pub struct ConsoleLogger {
    console: Arc<dyn Console>,
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(console: Arc<dyn Console>, level: LevelFilter) -> Self {
        Self { console, level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}: {}\n", record.level(), record.target(), record.args());
        self.console.putbuf(line.as_bytes());
    }

    fn flush(&self) {}
}

/// Install `logger` as the global logger.
///
/// Fails if a logger was already installed.
pub fn init(logger: &'static ConsoleLogger) -> Result<(), SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.level());
    Ok(())
}
