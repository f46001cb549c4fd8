//! # Sleep locks
//!
//! A [`SleepLock`] protects data that may be held across long operations such
//! as disk transfers. A contended acquirer does not burn its core: between
//! attempts it hands the CPU back to the scheduler through the [`Yield`] hook.
//! Waiters are woken in no particular order.

use crate::{Lock, LockGuard, Relax};
use core::hint::spin_loop;
use core::marker::PhantomData;

/// Scheduler hook invoked while a [`SleepLock`] is contended.
///
/// The kernel implements this by parking the current task and switching to
/// the next runnable one; hosted tests use `std::thread::yield_now`.
pub trait Yield {
    fn yield_now();
}

/// Fallback [`Yield`] for contexts without a scheduler: a single spin hint.
pub struct SpinYield;

impl Yield for SpinYield {
    #[inline]
    fn yield_now() {
        spin_loop();
    }
}

/// Waiting strategy of a [`SleepLock`]: yield through `Y`.
pub struct Sleep<Y>(PhantomData<fn() -> Y>);

impl<Y: Yield> Relax for Sleep<Y> {
    #[inline]
    fn relax() {
        Y::yield_now();
    }
}

/// A lock whose waiters yield instead of spinning.
///
/// It is fine to hold a `SleepLock` across blocking operations. Spin locks
/// must not be held while acquiring one.
pub type SleepLock<T, Y = SpinYield> = Lock<T, Sleep<Y>>;
pub type SleepLockGuard<'a, T, Y = SpinYield> = LockGuard<'a, T, Sleep<Y>>;
