use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq)]
enum State {
    Empty = 0,
    Writing = 1,
    Ready = 2,
}

/// Write-once slot for boot-time singletons.
///
/// The buffer cache and the frame allocator are each built exactly once during
/// boot and live until shutdown. The kernel keeps them in statics of this type
/// and hands out `&'static` references after initialization:
///
/// ```
/// use kernel_sync::SyncOnceCell;
///
/// static BOOT_VALUE: SyncOnceCell<u64> = SyncOnceCell::new();
///
/// assert!(BOOT_VALUE.get().is_none());
/// assert_eq!(*BOOT_VALUE.get_or_init(|| 42), 42);
/// assert_eq!(BOOT_VALUE.set(7), Err(7));
/// assert_eq!(BOOT_VALUE.get(), Some(&42));
/// ```
///
/// A thread that loses the race to initialize spins until the winner has
/// published its value.
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// Safety: the value is written once by the thread that moved the state to
// `Writing` and only shared after `Ready` is published.
unsafe impl<T: Sync + Send> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Empty as u8),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        (self.state.load(Ordering::Acquire) == State::Ready as u8).then(|| {
            // SAFETY: Ready observed with acquire
            unsafe { self.value_ref() }
        })
    }

    /// Store `value` if the cell is still empty; hands it back otherwise.
    ///
    /// # Errors
    /// The cell was already initialized or is being initialized.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self.begin_write() {
            self.publish(value);
            Ok(())
        } else {
            Err(value)
        }
    }

    /// The stored value, running `init` first if nobody has stored one yet.
    /// `init` runs at most once across all callers.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }
        if self.begin_write() {
            self.publish(init());
        } else {
            while self.state.load(Ordering::Acquire) != State::Ready as u8 {
                spin_loop();
            }
        }
        // SAFETY: published by us, or Ready observed with acquire
        unsafe { self.value_ref() }
    }

    /// Claim the right to write the value.
    fn begin_write(&self) -> bool {
        self.state
            .compare_exchange(
                State::Empty as u8,
                State::Writing as u8,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    fn publish(&self, value: T) {
        // SAFETY: only the thread that won `begin_write` gets here, and no
        // reader looks at the value before Ready.
        unsafe { (*self.value.get()).write(value) };
        self.state.store(State::Ready as u8, Ordering::Release);
    }

    /// # Safety
    /// `Ready` must have been observed with acquire ordering.
    unsafe fn value_ref(&self) -> &T {
        // SAFETY: Ready is only published after the write.
        unsafe { (*self.value.get()).assume_init_ref() }
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == State::Ready as u8 {
            // SAFETY: Ready, and nobody can borrow the value any more.
            unsafe { self.value.get_mut().assume_init_drop() }
        }
    }
}
