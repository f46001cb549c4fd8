//! # Physical Frame Allocation
//!
//! Hands out 4 KiB physical frames to the rest of the kernel, one free list
//! per core, with per-frame reference counts for copy-on-write sharing.
//!
//! ```text
//!   core 0            core 1            core N-1
//! ┌─────────┐       ┌─────────┐       ┌─────────┐
//! │FreeList │       │FreeList │  ...  │FreeList │   one SpinLock each
//! └────┬────┘       └────┬────┘       └────┬────┘
//!      │   steal ≤ quota │                 │
//!      └───────◄─────────┘                 │
//!                                          │
//! ┌────────────────────────────────────────▼────┐
//! │ Links: next index per frame (AtomicU32)     │   shared by all lists
//! ├─────────────────────────────────────────────┤
//! │ RefTable: count per frame                   │   one SpinLock
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! * [`FrameAllocator`]: allocation, free, sharing and copy-on-write.
//! * [`Frame`]: an owned reference to one allocated frame.
//! * [`PhysMapper`]: how the allocator reaches frame contents to scrub and
//!   copy them. The kernel uses [`HhdmPhysMapper`](phys_mapper::HhdmPhysMapper).
//!
//! ## Failure model
//!
//! Running out of memory is an ordinary [`AllocError`]. Handing the allocator
//! an address it never gave out, or freeing a frame twice, is a kernel bug
//! and panics with the corresponding [`FrameError`].
//!
//! ## Boot
//!
//! The allocator starts with every frame reserved. Boot code seeds the RAM
//! above the kernel image with
//! [`add_free_range`](FrameAllocator::add_free_range), which puts it all on
//! the booting core's list; other cores fill their lists by stealing.
//!
//! ```no_run
//! use kernel_alloc::{AllocatorConfig, FrameAllocator, PhysicalAddress};
//! use kernel_alloc::phys_mapper::HhdmPhysMapper;
//! use kernel_info::memory::{PHYS_LOAD, PHYS_TOP};
//! use kernel_sync::IrqPinned;
//!
//! fn core_id() -> usize {
//!     0 // read from the per-CPU block
//! }
//!
//! static FRAMES: FrameAllocator<HhdmPhysMapper, IrqPinned<fn() -> usize>> = unsafe {
//!     FrameAllocator::new(
//!         PhysicalAddress::new(PHYS_LOAD),
//!         HhdmPhysMapper,
//!         IrqPinned::new(core_id as fn() -> usize),
//!         AllocatorConfig::DEFAULT,
//!     )
//! };
//!
//! # let kernel_end = PhysicalAddress::new(PHYS_LOAD + 0x40_0000);
//! unsafe { FRAMES.add_free_range(kernel_end, PhysicalAddress::new(PHYS_TOP)) };
//! let page = FRAMES.allocate().expect("out of memory at boot");
//! FRAMES.free(page);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
mod frame;
pub mod frame_alloc;
mod free_list;
pub mod phys_mapper;
mod ref_count;

pub use error::{AllocError, FrameError};
pub use frame::{Frame, PhysicalAddress};
pub use frame_alloc::{AllocatorConfig, CopyOnWrite, FrameAllocator};
pub use phys_mapper::PhysMapper;
