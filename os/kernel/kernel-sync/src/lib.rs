//! # Kernel synchronization primitives
//!
//! The locking substrate shared by the buffer cache and the frame allocator:
//!
//! - [`SpinLock`]: busy-waiting lock for short critical sections.
//! - [`SleepLock`]: lock whose waiters [`Yield`] to the scheduler; may be held
//!   across I/O.
//!
//!   Both are a [`Lock`] over the same [`RawSpin`] word and differ only in
//!   their [`Relax`] strategy.
//! - [`visit_in_order`]: the one place that walks a family of sibling locks,
//!   holding at most one retained lock besides the one being inspected.
//! - [`CpuLocal`]: current core id plus a guard against migration.
//! - [`SyncOnceCell`]: init-once storage for boot-time singletons.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod cpu;
#[cfg(target_arch = "x86_64")]
pub mod irq;
mod ordered;
mod raw_spin;
mod sleep_lock;
mod spin_lock;
mod sync_once_cell;

pub use cpu::CpuLocal;
#[cfg(target_arch = "x86_64")]
pub use irq::{IrqGuard, IrqPinned};
pub use ordered::{Visit, visit_in_order};
pub use raw_spin::RawSpin;
pub use sleep_lock::{Sleep, SleepLock, SleepLockGuard, SpinYield, Yield};
pub use spin_lock::{Lock, LockGuard, Relax, Spin, SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
