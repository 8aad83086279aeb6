//! Synchronization primitives
//!
//! Locks are `spin::Mutex` throughout; this module adds the blocking
//! primitive the process lifecycle needs.

mod semaphore;

pub use semaphore::Semaphore;
