//! # Block Buffer Cache
//!
//! Keeps recently used disk blocks in memory and hands each one to a single
//! holder at a time. Every `(device, block)` pair is cached in at most one
//! buffer, so all users of a block see the same bytes.
//!
//! The kernel builds the cache once at boot and shares it through a
//! [`SyncOnceCell`](kernel_sync::SyncOnceCell):
//!
//! ```no_run
//! use kernel_bio::{BlockData, BlockDevice, BlockId, BufferCache, Direction};
//! use kernel_sync::SyncOnceCell;
//!
//! struct Disk;
//!
//! impl BlockDevice for Disk {
//!     fn transfer(&self, _block: BlockId, _data: &mut BlockData, _dir: Direction) {
//!         // program the controller and wait for completion
//!     }
//! }
//!
//! static BCACHE: SyncOnceCell<BufferCache<Disk>> = SyncOnceCell::new();
//!
//! let cache = BCACHE.get_or_init(|| BufferCache::new(Disk));
//! let mut buf = cache.acquire(1, 33);
//! buf[0] = 0xff;
//! cache.commit(&mut buf);
//! cache.release(buf);
//! ```
//!
//! ## Components
//!
//! * [`BufferCache`]: lookup, eviction, write-through and pinning.
//! * [`BufGuard`]: a buffer with its content lock held.
//! * [`Pin`]: a lock-free reference keeping a buffer resident.
//! * [`BlockDevice`]: the disk driver the cache reads from and writes to.
//! * [`CacheStats`]: hit, miss and eviction counters.
//!
//! ## Failure model
//!
//! Exhausting the cache (every buffer referenced) and reference count
//! underflow are kernel bugs: the operation panics with a [`CacheError`].

#![cfg_attr(not(any(test, doctest)), no_std)]

mod block;
mod bucket;
mod cache;
mod guard;
mod stats;

pub use block::{BlockData, BlockDevice, BlockId, Direction};
pub use cache::{BufferCache, CacheError};
pub use guard::{BufGuard, Pin};
pub use stats::CacheStats;
