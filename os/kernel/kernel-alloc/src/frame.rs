use core::fmt;
use core::ops::Add;
use kernel_info::memory::PAGE_SIZE;

/// Physical memory address.
///
/// A thin wrapper around a raw `u64` that denotes **physical** addresses, so
/// that frame addresses cannot be confused with kernel pointers.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0.is_multiple_of(PAGE_SIZE)
    }

    /// Round up to the next page boundary (identity if already aligned).
    #[inline]
    #[must_use]
    pub const fn page_align_up(self) -> Self {
        Self((self.0 + (PAGE_SIZE - 1)) & !(PAGE_SIZE - 1))
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// One owned reference to an allocated 4 KiB physical frame.
///
/// A `Frame` is neither `Copy` nor `Clone`: every value stands for exactly one
/// unit of the frame's reference count. Additional owners are created with
/// [`FrameAllocator::increment_ref`](crate::FrameAllocator::increment_ref) and
/// every owner ends with [`FrameAllocator::free`](crate::FrameAllocator::free).
///
/// Page tables store bare addresses; use [`into_raw`](Self::into_raw) and
/// [`from_raw`](Self::from_raw) to cross that boundary.
#[must_use = "a dropped Frame leaks its reference; hand it back to the allocator"]
#[derive(Debug, Eq, PartialEq)]
pub struct Frame(PhysicalAddress);

impl Frame {
    pub(crate) const fn new(pa: PhysicalAddress) -> Self {
        Self(pa)
    }

    /// Base address of the frame.
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> PhysicalAddress {
        self.0
    }

    /// Give up the handle without touching the reference count.
    #[inline]
    #[must_use]
    pub const fn into_raw(self) -> PhysicalAddress {
        self.0
    }

    /// Re-materialize a handle previously released with [`into_raw`](Self::into_raw).
    ///
    /// # Safety
    /// `pa` must carry one reference that the caller owns, e.g. because it was
    /// read back from a page-table entry that was filled from `into_raw`.
    #[inline]
    pub const unsafe fn from_raw(pa: PhysicalAddress) -> Self {
        Self(pa)
    }
}
