//! Counting semaphore
//!
//! The blocking primitive behind `wait` and `exec`. Counting rather than
//! flag-based: an `up` that happens before the matching `down` is kept,
//! so a child that exits before its parent waits never loses the wakeup.
//!
//! `down` busy-waits. Between attempts it calls the semaphore's
//! [`RelaxStrategy`], [`Spin`] by default, the same hook `spin::Mutex`
//! takes. A kernel that can block or yield a thread supplies its own
//! strategy through [`Semaphore::with_relax`]. With plain spinning the
//! thread that will call `up` must be preemptively scheduled.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::relax::{RelaxStrategy, Spin};

/// A counting semaphore.
pub struct Semaphore<R = Spin> {
    count: AtomicUsize,
    relax: PhantomData<R>,
}

impl Semaphore {
    /// Create a spinning semaphore holding `initial` permits.
    pub const fn new(initial: usize) -> Self {
        Self::with_relax(initial)
    }
}

impl<R> Semaphore<R> {
    /// Create a semaphore holding `initial` permits that waits with `R`.
    pub const fn with_relax(initial: usize) -> Self {
        Self {
            count: AtomicUsize::new(initial),
            relax: PhantomData,
        }
    }

    /// Release one permit.
    pub fn up(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Take a permit if one is available.
    pub fn try_down(&self) -> bool {
        let mut current = self.count.load(Ordering::Relaxed);
        while current > 0 {
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    /// Permits currently available.
    pub fn value(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl<R: RelaxStrategy> Semaphore<R> {
    /// Take a permit, relaxing until one is released.
    pub fn down(&self) {
        while !self.try_down() {
            R::relax();
        }
    }
}

impl<R> Default for Semaphore<R> {
    fn default() -> Self {
        Self::with_relax(0)
    }
}

impl<R> fmt::Debug for Semaphore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore").field("count", &self.value()).finish()
    }
}
