//! # Hash buckets
//!
//! A bucket is an unordered, fixed-capacity set of [`Entry`] records: the
//! metadata of the buffers whose identity hashes to it. Any single bucket may
//! end up holding every buffer of the pool, so capacity is the pool size.
//! The slot index inside an entry is the buffer's permanent arena position;
//! only entries move between buckets, never buffer contents.

use crate::BlockId;

/// References on one buffer: acquired guards plus outstanding pins.
///
/// Changed only by [`increment`](Self::increment) and
/// [`decrement`](Self::decrement), under the lock of the entry's bucket.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct RefCount(u32);

impl RefCount {
    pub(crate) const ZERO: Self = Self(0);

    #[inline]
    pub(crate) const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn is_free(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub(crate) const fn increment(&mut self) {
        self.0 += 1;
    }

    /// Returns the new count, `None` if there was no reference to drop.
    #[inline]
    pub(crate) const fn decrement(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        self.0 -= 1;
        Some(self.0)
    }
}

/// Metadata of one buffer, guarded by the lock of the bucket it sits in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Entry {
    /// Arena index of the buffer's content.
    pub(crate) slot: usize,
    /// `None` until the buffer is first claimed.
    pub(crate) block: Option<BlockId>,
    pub(crate) refcnt: RefCount,
    /// Logical time of the last release to zero; 0 if never released.
    pub(crate) released_at: u64,
}

impl Entry {
    const fn unused(slot: usize) -> Self {
        Self {
            slot,
            block: None,
            refcnt: RefCount::ZERO,
            released_at: 0,
        }
    }
}

pub(crate) struct Bucket<const N: usize> {
    entries: [Entry; N],
    len: usize,
}

impl<const N: usize> Bucket<N> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: [Entry::unused(0); N],
            len: 0,
        }
    }

    /// A bucket holding every unused buffer of the pool.
    pub(crate) const fn with_all_slots() -> Self {
        let mut bucket = Self::new();
        while bucket.len < N {
            bucket.entries[bucket.len] = Entry::unused(bucket.len);
            bucket.len += 1;
        }
        bucket
    }

    #[inline]
    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries[..self.len]
    }

    /// Take a reference on the buffer holding `id`, if it is here.
    pub(crate) fn hit(&mut self, id: BlockId) -> Option<usize> {
        let entry = self.entries[..self.len]
            .iter_mut()
            .find(|e| e.block == Some(id))?;
        entry.refcnt.increment();
        Some(entry.slot)
    }

    /// Position and timestamp of the least recently released unreferenced
    /// entry. Ties go to the earlier position.
    pub(crate) fn oldest_free(&self) -> Option<(usize, u64)> {
        self.entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.refcnt.is_free())
            .min_by_key(|&(_, e)| e.released_at)
            .map(|(pos, e)| (pos, e.released_at))
    }

    pub(crate) fn find_mut(&mut self, slot: usize) -> Option<&mut Entry> {
        self.entries[..self.len].iter_mut().find(|e| e.slot == slot)
    }

    /// Unlink the entry at `pos`. Order within the bucket is not preserved.
    pub(crate) fn take(&mut self, pos: usize) -> Entry {
        assert!(pos < self.len, "bucket position {pos} out of bounds");
        let entry = self.entries[pos];
        self.len -= 1;
        self.entries[pos] = self.entries[self.len];
        entry
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        assert!(self.len < N, "bucket overflow: more entries than buffers");
        self.entries[self.len] = entry;
        self.len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimed(slot: usize, block: u32, refs: u32, released_at: u64) -> Entry {
        let mut entry = Entry {
            slot,
            block: Some(BlockId::new(1, block)),
            refcnt: RefCount::ZERO,
            released_at,
        };
        for _ in 0..refs {
            entry.refcnt.increment();
        }
        entry
    }

    #[test]
    fn ref_count_stops_at_zero() {
        let mut refs = RefCount::ZERO;
        refs.increment();
        refs.increment();
        assert_eq!(refs.decrement(), Some(1));
        assert_eq!(refs.decrement(), Some(0));
        assert!(refs.is_free());
        assert_eq!(refs.decrement(), None);
        assert_eq!(refs.get(), 0);
    }

    #[test]
    fn starts_with_every_slot_unused() {
        let b = Bucket::<4>::with_all_slots();
        let slots: Vec<_> = b.entries().iter().map(|e| e.slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert!(b.entries().iter().all(|e| e.block.is_none() && e.refcnt.is_free()));
    }

    #[test]
    fn hit_takes_a_reference() {
        let mut b = Bucket::<4>::new();
        b.push(claimed(2, 9, 0, 5));
        assert_eq!(b.hit(BlockId::new(1, 9)), Some(2));
        assert_eq!(b.entries()[0].refcnt.get(), 1);
        assert_eq!(b.hit(BlockId::new(2, 9)), None);
    }

    #[test]
    fn oldest_free_ignores_referenced_entries() {
        let mut b = Bucket::<4>::new();
        b.push(claimed(0, 1, 1, 0));
        b.push(claimed(1, 2, 0, 7));
        b.push(claimed(2, 3, 0, 4));
        assert_eq!(b.oldest_free(), Some((2, 4)));

        b.find_mut(2).unwrap().refcnt.increment();
        assert_eq!(b.oldest_free(), Some((1, 7)));
    }

    #[test]
    fn take_and_push_move_entries() {
        let mut b = Bucket::<3>::with_all_slots();
        let e = b.take(0);
        assert_eq!(e.slot, 0);
        assert_eq!(b.entries().len(), 2);
        assert!(b.find_mut(0).is_none());

        let mut other = Bucket::<3>::new();
        other.push(e);
        assert_eq!(other.entries(), &[e]);
    }

    #[test]
    #[should_panic(expected = "bucket overflow")]
    fn push_beyond_the_pool_is_an_invariant_break() {
        let mut b = Bucket::<2>::with_all_slots();
        b.push(Entry::unused(2));
    }
}
