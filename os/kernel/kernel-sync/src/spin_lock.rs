//! # Guarded locks
//!
//! [`Lock`] pairs a [`RawSpin`] word with the data it protects. The waiting
//! strategy is a type parameter: [`Spin`] burns the core (a [`SpinLock`]),
//! [`Sleep`](crate::Sleep) hands it to the scheduler (a
//! [`SleepLock`](crate::SleepLock)). Everything else, guards included, is
//! shared.

use crate::RawSpin;
use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// What a waiter does while the lock is held by someone else.
pub trait Relax {
    fn relax();
}

/// Busy-wait with a CPU spin hint.
pub struct Spin;

impl Relax for Spin {
    #[inline]
    fn relax() {
        spin_loop();
    }
}

/// Mutual exclusion around a `T`, waiting according to `W`.
pub struct Lock<T, W> {
    raw: RawSpin,
    inner: UnsafeCell<T>,
    _wait: PhantomData<fn() -> W>,
}

/// Busy-waiting lock for short critical sections.
///
/// Never held across anything that can block: disk I/O, a
/// [`SleepLock`](crate::SleepLock) acquisition, or a yield.
pub type SpinLock<T> = Lock<T, Spin>;
pub type SpinLockGuard<'a, T> = LockGuard<'a, T, Spin>;

// Safety: one holder at a time; only T: Send may cross threads.
unsafe impl<T: Send, W> Sync for Lock<T, W> {}

impl<T: Default, W> Default for Lock<T, W> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T, W> Lock<T, W> {
    pub const fn new(inner: T) -> Self {
        Self {
            raw: RawSpin::new(),
            inner: UnsafeCell::new(inner),
            _wait: PhantomData,
        }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<LockGuard<'_, T, W>> {
        // Lazily: a guard built for a failed attempt would unlock on drop.
        self.raw.try_lock().then(|| LockGuard { lock: self })
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

}

impl<T, W: Relax> Lock<T, W> {
    #[inline]
    pub fn lock(&self) -> LockGuard<'_, T, W> {
        self.raw.lock_with(W::relax);
        LockGuard { lock: self }
    }

    /// Run `f` with the lock held.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Proof of holding a [`Lock`]; unlocks on drop, also during unwinding.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, T, W> {
    lock: &'a Lock<T, W>,
}

impl<T, W> Deref for LockGuard<'_, T, W> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.lock.inner.get() }
    }
}

impl<T, W> DerefMut for LockGuard<'_, T, W> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: held lock, and `&mut self` rules out other borrows through this guard.
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<T, W> Drop for LockGuard<'_, T, W> {
    fn drop(&mut self) {
        // SAFETY: this guard is the holder.
        unsafe { self.lock.raw.unlock() }
    }
}
