//! # Memory Layout

/// Size of a physical page frame in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel image is placed in *physical* memory (LMA) before paging.
/// Physical memory managed by the frame allocator starts here.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Exclusive end of the physical RAM handed to the frame allocator.
pub const PHYS_TOP: u64 = PHYS_LOAD + 128 * 1024 * 1024;

/// Number of page frames in `[PHYS_LOAD, PHYS_TOP)`; sizes the per-frame
/// reference count table.
pub const MANAGED_FRAMES: usize = ((PHYS_TOP - PHYS_LOAD) / PAGE_SIZE) as usize;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PHYS_LOAD.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_TOP.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_TOP > PHYS_LOAD);
    // Frame indices are stored as u32 in the free-list links.
    assert!(MANAGED_FRAMES < u32::MAX as usize);
};
