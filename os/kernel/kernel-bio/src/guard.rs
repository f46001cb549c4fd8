use crate::{BlockData, BlockId, BufferCache};
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use kernel_sync::{SleepLockGuard, Yield};

/// A buffer returned by [`BufferCache::acquire`]: the content lock is held
/// and one reference is counted until the guard is dropped or handed to
/// [`BufferCache::release`].
///
/// Dereferences to the block contents.
#[must_use = "dropping the guard releases the buffer immediately"]
pub struct BufGuard<'a, D, Y: Yield, const NBUF: usize, const NBUCKET: usize> {
    pub(crate) cache: &'a BufferCache<D, Y, NBUF, NBUCKET>,
    pub(crate) id: BlockId,
    pub(crate) slot: usize,
    data: ManuallyDrop<SleepLockGuard<'a, BlockData, Y>>,
    read_from_disk: bool,
}

impl<'a, D, Y: Yield, const NBUF: usize, const NBUCKET: usize> BufGuard<'a, D, Y, NBUF, NBUCKET> {
    pub(crate) const fn new(
        cache: &'a BufferCache<D, Y, NBUF, NBUCKET>,
        id: BlockId,
        slot: usize,
        data: SleepLockGuard<'a, BlockData, Y>,
        read_from_disk: bool,
    ) -> Self {
        Self {
            cache,
            id,
            slot,
            data: ManuallyDrop::new(data),
            read_from_disk,
        }
    }

    /// The block this buffer holds.
    #[inline]
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.id
    }

    /// Whether this acquire had to load the contents from disk, as opposed to
    /// finding them already valid in the cache.
    #[inline]
    #[must_use]
    pub const fn read_from_disk(&self) -> bool {
        self.read_from_disk
    }
}

impl<D, Y: Yield, const NBUF: usize, const NBUCKET: usize> Deref for BufGuard<'_, D, Y, NBUF, NBUCKET> {
    type Target = BlockData;

    fn deref(&self) -> &BlockData {
        &self.data
    }
}

impl<D, Y: Yield, const NBUF: usize, const NBUCKET: usize> DerefMut for BufGuard<'_, D, Y, NBUF, NBUCKET> {
    fn deref_mut(&mut self) -> &mut BlockData {
        &mut self.data
    }
}

impl<D, Y: Yield, const NBUF: usize, const NBUCKET: usize> Drop for BufGuard<'_, D, Y, NBUF, NBUCKET> {
    fn drop(&mut self) {
        // Content lock first: once the count can reach zero the buffer may be
        // claimed for another block.
        // SAFETY: dropped exactly once, here; `data` is not touched afterwards.
        unsafe { ManuallyDrop::drop(&mut self.data) };
        self.cache.unreference(self.id, self.slot, "release");
    }
}

/// A reference on a resident buffer that holds no content lock, taken with
/// [`BufferCache::pin`] and returned with [`BufferCache::unpin`].
///
/// While a pin is outstanding the buffer keeps its block and is never chosen
/// for eviction.
#[derive(Debug, Eq, PartialEq)]
#[must_use = "a dropped Pin keeps its buffer resident forever"]
pub struct Pin {
    pub(crate) id: BlockId,
    pub(crate) slot: usize,
}

impl Pin {
    #[inline]
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.id
    }
}
