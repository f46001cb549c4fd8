//! # Tunables

/// Maximum number of cores the per-core structures are sized for.
pub const NCPU: usize = 8;

/// Block size of the backing disk, in bytes.
pub const BSIZE: usize = 1024;

/// Size of the buffer cache, in blocks. Three times the largest number of
/// blocks any single file-system operation writes.
pub const NBUF: usize = 30;

/// Number of hash buckets in the buffer cache. A prime keeps
/// `(dev << 27 | block) % NBUCKET` from clustering on strided block numbers.
pub const NBUCKET: usize = 13;

/// Upper bound on frames moved from one donor core in a single steal.
pub const STEAL_QUOTA: usize = 64;

/// Byte written over every frame handed out by the allocator.
pub const ALLOC_FILL: u8 = 0x00;

/// Junk byte written over every frame returned to the allocator, so that
/// dangling references read obvious garbage.
pub const FREE_FILL: u8 = 0x01;

const _: () = {
    assert!(NCPU > 0);
    assert!(NBUCKET > 0);
    assert!(NBUF >= NBUCKET);
    assert!(STEAL_QUOTA > 0);
    assert!(BSIZE.is_power_of_two());
};
