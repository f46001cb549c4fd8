//! # Physical-to-virtual mapping for frame contents
//!
//! The allocator never dereferences physical addresses itself. Scrubbing a
//! frame or duplicating it for copy-on-write goes through a [`PhysMapper`],
//! which turns a physical address into a pointer in the current address space.
//!
//! - In the kernel this is [`HhdmPhysMapper`]: every physical address is
//!   mapped at `HHDM_BASE + pa`.
//! - Tests back "physical memory" with a heap allocation and offset into it.

use crate::PhysicalAddress;
use kernel_info::memory::HHDM_BASE;

/// Converts physical addresses to usable pointers in the current address space.
pub trait PhysMapper {
    /// Pointer through which the byte at `pa` can be accessed.
    ///
    /// Computing the pointer is harmless; dereferencing it is the caller's
    /// `unsafe` responsibility.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        (**self).phys_to_ptr(pa)
    }
}

/// The kernel's mapper: all of physical RAM is mapped at [`HHDM_BASE`], so a
/// frame's contents sit at `HHDM_BASE + pa`.
///
/// Only meaningful once the higher-half direct map covers the managed range.
///
/// ```
/// use kernel_alloc::{PhysicalAddress, phys_mapper::{HhdmPhysMapper, PhysMapper}};
/// use kernel_info::memory::HHDM_BASE;
///
/// let ptr = HhdmPhysMapper.phys_to_ptr(PhysicalAddress::new(0x1234_0000));
/// assert_eq!(ptr as u64, HHDM_BASE + 0x1234_0000);
/// ```
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        (HHDM_BASE + pa.as_u64()) as *mut u8
    }
}
