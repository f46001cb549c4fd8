use core::fmt;
use kernel_info::param::BSIZE;

/// Contents of one disk block.
pub type BlockData = [u8; BSIZE];

/// Identity of a cached block: device number and block number on it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlockId {
    pub dev: u32,
    pub block: u32,
}

impl BlockId {
    #[inline]
    #[must_use]
    pub const fn new(dev: u32, block: u32) -> Self {
        Self { dev, block }
    }

    /// Hash bucket of this identity among `buckets`.
    ///
    /// The device number occupies the top bits; devices at or above 32 wrap.
    #[inline]
    #[must_use]
    pub const fn bucket(self, buckets: usize) -> usize {
        ((self.dev << 27) | self.block) as usize % buckets
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.block)
    }
}

/// Direction of a block transfer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    /// Disk to memory.
    Read,
    /// Memory to disk.
    Write,
}

/// The disk driver as seen by the cache.
///
/// `transfer` moves exactly one block and returns when the transfer has
/// completed. The cache never calls it while holding a spin lock; the
/// buffer's sleep lock is held for the duration.
pub trait BlockDevice {
    fn transfer(&self, block: BlockId, data: &mut BlockData, direction: Direction);
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    #[inline]
    fn transfer(&self, block: BlockId, data: &mut BlockData, direction: Direction) {
        (**self).transfer(block, data, direction);
    }
}
