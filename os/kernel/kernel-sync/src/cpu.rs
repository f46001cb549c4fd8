//! # Current-core identity

/// Access to the identity of the executing core.
///
/// Per-core data structures index by [`core_id`](Self::core_id), which is only
/// meaningful while the caller cannot migrate. Callers therefore take a
/// [`pin`](Self::pin) guard first and read the id while holding it:
///
/// ```
/// use kernel_sync::CpuLocal;
///
/// struct Uniprocessor;
///
/// impl CpuLocal for Uniprocessor {
///     type Pin = ();
///     fn pin(&self) {}
///     fn core_id(&self) -> usize {
///         0
///     }
/// }
///
/// let cpu = Uniprocessor;
/// let _pin = cpu.pin();
/// assert_eq!(cpu.core_id(), 0);
/// ```
pub trait CpuLocal {
    /// Guard keeping the caller on its current core (preemption or interrupts
    /// disabled) until dropped.
    type Pin;

    fn pin(&self) -> Self::Pin;

    /// Index of the executing core, `0..NCPU`.
    fn core_id(&self) -> usize;
}

impl<C: CpuLocal + ?Sized> CpuLocal for &C {
    type Pin = C::Pin;

    #[inline]
    fn pin(&self) -> Self::Pin {
        (**self).pin()
    }

    #[inline]
    fn core_id(&self) -> usize {
        (**self).core_id()
    }
}
