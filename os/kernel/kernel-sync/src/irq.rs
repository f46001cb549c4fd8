//! # Interrupt masking on x86-64
//!
//! The kernel keeps a thread on its core by masking interrupts: with `IF`
//! clear the timer cannot preempt it. [`IrqGuard`] does that for a scope and
//! [`IrqPinned`] plugs it into [`CpuLocal`].

use crate::CpuLocal;
use core::arch::asm;

/// `IF`, the interrupt enable flag in `RFLAGS`.
const RFLAGS_IF: u64 = 1 << 9;

#[inline]
fn interrupts_enabled() -> bool {
    let rflags: u64;
    // SAFETY: reads RFLAGS through the stack, nothing else is touched.
    unsafe { asm!("pushfq", "pop {}", out(reg) rflags, options(nomem, preserves_flags)) };
    rflags & RFLAGS_IF != 0
}

/// Masks interrupts until dropped.
///
/// Only a guard that actually cleared `IF` sets it again, so guards nest and
/// a guard taken with interrupts already off leaves them off.
///
/// Ring 0 only: `cli`/`sti` fault in user mode.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard {
    restore: bool,
}

impl IrqGuard {
    #[inline]
    pub fn new() -> Self {
        let restore = interrupts_enabled();
        if restore {
            // SAFETY: ring 0; masking is undone by this guard's drop.
            unsafe { asm!("cli", options(nomem, nostack)) };
        }
        Self { restore }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.restore {
            // SAFETY: ring 0; IF was set when this guard cleared it.
            unsafe { asm!("sti", options(nomem, nostack)) };
        }
    }
}

/// [`CpuLocal`] for the kernel proper: pins with an [`IrqGuard`] and reads
/// the core index through `read_id` (typically the per-CPU block behind `GS`).
pub struct IrqPinned<F> {
    read_id: F,
}

impl<F: Fn() -> usize> IrqPinned<F> {
    pub const fn new(read_id: F) -> Self {
        Self { read_id }
    }
}

impl<F: Fn() -> usize> CpuLocal for IrqPinned<F> {
    type Pin = IrqGuard;

    #[inline]
    fn pin(&self) -> IrqGuard {
        IrqGuard::new()
    }

    #[inline]
    fn core_id(&self) -> usize {
        (self.read_id)()
    }
}
