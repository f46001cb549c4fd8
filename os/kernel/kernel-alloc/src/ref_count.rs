//! # Per-frame reference counts
//!
//! One [`RefCount`] per managed frame, held in a [`RefTable`] that the
//! allocator keeps behind its own spin lock. A count is only ever changed
//! through the named transitions below, each of which checks the state it
//! expects, so a double free or a reference to a free frame is caught at the
//! offending call instead of corrupting a free list later.
//!
//! | Count | Meaning |
//! |-------|---------|
//! | 0 | on some core's free list |
//! | 1 | exclusively owned |
//! | n > 1 | shared copy-on-write by n mappings |

/// Reference count of a single frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct RefCount(u32);

impl RefCount {
    /// Frames start out owned by the boot code until seeded into the allocator.
    pub(crate) const RESERVED: Self = Self(1);

    #[inline]
    pub(crate) const fn get(self) -> u32 {
        self.0
    }

    /// `0 -> 1` when a free frame is handed out. `false` if the frame was
    /// still referenced.
    #[inline]
    const fn claim(&mut self) -> bool {
        if self.0 != 0 {
            return false;
        }
        self.0 = 1;
        true
    }

    /// `n -> n + 1` for `n >= 1`. Returns the new count, `None` if the frame was free.
    #[inline]
    const fn increment(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        self.0 += 1;
        Some(self.0)
    }

    /// `n -> n - 1` for `n >= 1`. Returns the new count, `None` if the frame was free.
    #[inline]
    const fn decrement(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        self.0 -= 1;
        Some(self.0)
    }
}

/// Reference counts for `N` frames, indexed by frame number within the
/// managed range.
pub(crate) struct RefTable<const N: usize> {
    counts: [RefCount; N],
}

impl<const N: usize> RefTable<N> {
    pub(crate) const fn new() -> Self {
        Self {
            counts: [RefCount::RESERVED; N],
        }
    }

    #[inline]
    pub(crate) const fn get(&self, idx: usize) -> u32 {
        self.counts[idx].get()
    }

    #[inline]
    pub(crate) const fn claim(&mut self, idx: usize) -> bool {
        self.counts[idx].claim()
    }

    #[inline]
    pub(crate) const fn increment(&mut self, idx: usize) -> Option<u32> {
        self.counts[idx].increment()
    }

    #[inline]
    pub(crate) const fn decrement(&mut self, idx: usize) -> Option<u32> {
        self.counts[idx].decrement()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_never_go_below_zero() {
        let mut t = RefTable::<2>::new();
        assert_eq!(t.decrement(0), Some(0));
        assert_eq!(t.decrement(0), None);
        assert_eq!(t.get(0), 0);
        assert_eq!(t.increment(0), None);
    }

    #[test]
    fn claim_only_succeeds_on_free_frames() {
        let mut t = RefTable::<1>::new();
        assert!(!t.claim(0));
        t.decrement(0);
        assert!(t.claim(0));
        assert_eq!(t.increment(0), Some(2));
        assert_eq!(t.get(0), 2);
    }
}
