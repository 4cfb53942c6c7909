//! Send permits.
//!
//! A permit admits one sender into the write path at a time. The
//! [`PermitGuard`] returns it on drop, so early returns and unwinding both
//! release it.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Acquire/release capability guarding a shared sink.
pub trait Permit: Send + Sync {
    /// Block until the permit is available, then take it.
    fn acquire(&self);

    /// Take the permit, waiting at most `timeout`. Returns `false` on timeout.
    fn try_acquire_for(&self, timeout: Duration) -> bool;

    /// Hand the permit back.
    fn release(&self);

    /// Number of permits currently available.
    fn available(&self) -> usize;
}

impl<P: Permit + ?Sized> Permit for Arc<P> {
    fn acquire(&self) {
        (**self).acquire()
    }

    fn try_acquire_for(&self, timeout: Duration) -> bool {
        (**self).try_acquire_for(timeout)
    }

    fn release(&self) {
        (**self).release()
    }

    fn available(&self) -> usize {
        (**self).available()
    }
}

/// Scoped hold on a [`Permit`]; releases it when dropped.
#[must_use = "the permit is released as soon as the guard is dropped"]
pub struct PermitGuard<'a, P: Permit + ?Sized> {
    permit: &'a P,
}

impl<'a, P: Permit + ?Sized> PermitGuard<'a, P> {
    /// Block until `permit` is acquired.
    pub fn acquire(permit: &'a P) -> Self {
        permit.acquire();
        Self { permit }
    }

    /// Acquire `permit`, giving up after `timeout`.
    pub fn try_acquire_for(permit: &'a P, timeout: Duration) -> Option<Self> {
        // Build the guard only on success; a dropped guard releases.
        permit.try_acquire_for(timeout).then(|| Self { permit })
    }
}

impl<P: Permit + ?Sized> Drop for PermitGuard<'_, P> {
    fn drop(&mut self) {
        self.permit.release();
    }
}

/// Single-holder permit: a mutual-exclusion lock with an observable count.
///
/// Waiters are woken in unspecified order.
#[derive(Debug, Default)]
pub struct SendLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl SendLock {
    pub fn new() -> Self {
        Self::default()
    }

    // The flag is the only state, so a poisoned lock is still consistent.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Permit for SendLock {
    fn acquire(&self) {
        let mut held = self.state();
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    fn try_acquire_for(&self, timeout: Duration) -> bool {
        // A timeout past the clock's range never expires.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.acquire();
            return true;
        };
        let mut held = self.state();
        loop {
            if !*held {
                *held = true;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            held = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn release(&self) {
        *self.state() = false;
        self.released.notify_one();
    }

    fn available(&self) -> usize {
        usize::from(!*self.state())
    }
}
