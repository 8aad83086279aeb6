//! Console device contract
//!
//! The console driver itself lives outside the syscall boundary. This
//! module names what the boundary needs from it: one byte of keyboard
//! input at a time, and raw output of a byte buffer.
//!
//! # Security Considerations
//! - Output is written as raw bytes; no interpretation of user data
//! - A single `putbuf` call is emitted atomically by the driver

use alloc::vec::Vec;

/// Console input and output.
pub trait Console: Send + Sync {
    /// Block until a key is available and return it.
    fn getc(&self) -> u8;

    /// Write `bytes` to the console as one unit.
    fn putbuf(&self, bytes: &[u8]);
}

/// Read console input into a buffer of at most `limit` bytes.
///
/// Stops after a newline (which is kept) or once `limit` bytes are read.
pub fn read_line(console: &dyn Console, limit: usize) -> Vec<u8> {
    let mut line = Vec::with_capacity(limit.min(256));
    while line.len() < limit {
        let byte = console.getc();
        line.push(byte);
        if byte == b'\n' {
            break;
        }
    }
    line
}
