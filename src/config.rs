//! Kernel configuration
//!
//! Limits applied at the syscall boundary. Address-space constants live in
//! [`crate::mm::address`]; everything tunable per kernel build lives here.

/// Limits applied at the syscall boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Longest user string (excluding the terminator) the validator will copy.
    /// A longer string without a terminator is treated as a bad pointer.
    pub max_user_string: u32,
    /// Longest command line `exec` accepts, in bytes.
    pub max_command_line: usize,
    /// Most whitespace-separated tokens `exec` accepts.
    pub max_args: usize,
    /// First descriptor handed out by `open`. 0 and 1 are the console.
    pub first_fd: i32,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            max_user_string: 4096,
            max_command_line: 128,
            max_args: 32,
            first_fd: 2,
        }
    }

    #[must_use]
    pub const fn with_max_user_string(mut self, len: u32) -> Self {
        self.max_user_string = len;
        self
    }

    #[must_use]
    pub const fn with_max_command_line(mut self, len: usize) -> Self {
        self.max_command_line = len;
        self
    }

    #[must_use]
    pub const fn with_max_args(mut self, count: usize) -> Self {
        self.max_args = count;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
