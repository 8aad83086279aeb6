//! Device contracts used by the syscall boundary
//!
//! The drivers themselves are external; the boundary only consumes:
//! - a console for `read(0, ..)`, `write(1, ..)` and exit lines
//! - a machine handle for `halt`

pub mod console;
pub mod machine;

pub use console::Console;
pub use machine::Machine;
