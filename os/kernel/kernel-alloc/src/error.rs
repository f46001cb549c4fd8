use crate::PhysicalAddress;

/// Recoverable allocation failure; the caller decides whether to give up.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("out of physical memory")]
    OutOfMemory,
}

/// A frame address that the allocator refuses to accept.
///
/// These indicate a bug elsewhere in the kernel (a dangling or forged frame
/// address, a double free) and are turned into panics by the public
/// operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("frame {0} is not page aligned")]
    Misaligned(PhysicalAddress),
    #[error("frame {0} lies outside the managed range")]
    OutOfRange(PhysicalAddress),
    #[error("frame {0} is not allocated")]
    NotAllocated(PhysicalAddress),
    #[error("frame {0} on a free list still has references")]
    StillReferenced(PhysicalAddress),
    #[error("core {0} has no free list")]
    UnknownCore(usize),
}
