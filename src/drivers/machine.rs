//! Platform power control

/// Whole-machine control used by `halt`.
pub trait Machine: Send + Sync {
    /// Power the machine off. On real hardware this does not return;
    /// emulated platforms may return once shutdown has been requested.
    fn power_off(&self);
}
