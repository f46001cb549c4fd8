use core::sync::atomic::{AtomicBool, Ordering};

/// The lock word underneath every lock in this crate.
///
/// Acquisition is test-and-test-and-set: one atomic swap attempt, then plain
/// loads until the word looks free again, so waiters do not bounce the cache
/// line while the holder works. What a waiter does between loads is up to the
/// caller of [`lock_with`](Self::lock_with).
pub struct RawSpin {
    word: AtomicBool,
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            word: AtomicBool::new(false),
        }
    }

    /// Acquire, calling `relax` each time the word is observed taken.
    #[inline]
    pub fn lock_with(&self, mut relax: impl FnMut()) {
        while self.word.swap(true, Ordering::Acquire) {
            while self.is_locked() {
                relax();
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn try_lock(&self) -> bool {
        !self.is_locked()
            && self
                .word
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    /// Snapshot of the word; stale as soon as it is returned.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Relaxed)
    }

    /// # Safety
    /// Only the current holder may unlock.
    #[inline]
    pub unsafe fn unlock(&self) {
        self.word.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relax_runs_only_while_contended() {
        let raw = RawSpin::new();
        let mut spins = 0;
        raw.lock_with(|| spins += 1);
        assert_eq!(spins, 0);
        assert!(!raw.try_lock());
        unsafe { raw.unlock() };
        assert!(raw.try_lock());
    }
}
