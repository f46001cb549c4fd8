//! # Per-core physical frame allocator
//!
//! Every core owns a free list behind its own spin lock, so allocation and
//! free on a balanced system never contend across cores. A core whose list
//! runs dry steals a bounded batch from the first other core that has frames,
//! visiting donors in ascending core order and never holding two free-list
//! locks at once.
//!
//! Each frame carries a reference count so that pages can be shared
//! copy-on-write. [`increment_ref`] adds an owner and [`copy_on_write`] gives
//! a writer its private copy. [`free`] only recycles a frame once the last
//! owner is gone.
//!
//! Lock order: the reference table lock and a free-list lock are never held
//! together. Frame contents are scrubbed and copied with no lock held.
//!
//! [`increment_ref`]: FrameAllocator::increment_ref
//! [`copy_on_write`]: FrameAllocator::copy_on_write
//! [`free`]: FrameAllocator::free

use crate::free_list::{FreeList, Links};
use crate::ref_count::RefTable;
use crate::{AllocError, Frame, FrameError, PhysMapper, PhysicalAddress};
use core::ptr;
use kernel_info::memory::{MANAGED_FRAMES, PAGE_SIZE};
use kernel_info::param::{ALLOC_FILL, FREE_FILL, NCPU, STEAL_QUOTA};
use kernel_sync::{CpuLocal, SpinLock, Visit, visit_in_order};
use log::{debug, info, trace};

#[allow(clippy::cast_possible_truncation)]
const FRAME_BYTES: usize = PAGE_SIZE as usize;

/// Runtime knobs of the allocator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AllocatorConfig {
    /// Most frames taken from one donor core per steal.
    pub steal_quota: usize,
    /// Byte written over frames as they are handed out.
    pub alloc_fill: u8,
    /// Junk byte written over frames as they are recycled.
    pub free_fill: u8,
}

impl AllocatorConfig {
    pub const DEFAULT: Self = Self {
        steal_quota: STEAL_QUOTA,
        alloc_fill: ALLOC_FILL,
        free_fill: FREE_FILL,
    };
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Outcome of [`FrameAllocator::copy_on_write`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CopyOnWrite {
    /// The caller was the only owner and keeps writing to the same frame.
    Reused,
    /// The handle now refers to a private duplicate.
    Copied,
}

/// Physical frame allocator over `FRAMES` frames starting at `base`, with one
/// free list per core for `CORES` cores.
///
/// The kernel keeps a single instance in a `static`; `new` is `const` so the
/// multi-hundred-KiB tables never pass through a stack.
pub struct FrameAllocator<M, C, const FRAMES: usize = MANAGED_FRAMES, const CORES: usize = NCPU> {
    base: PhysicalAddress,
    mapper: M,
    cpu: C,
    config: AllocatorConfig,
    lists: [SpinLock<FreeList>; CORES],
    links: Links<FRAMES>,
    refs: SpinLock<RefTable<FRAMES>>,
}

impl<M, C, const FRAMES: usize, const CORES: usize> FrameAllocator<M, C, FRAMES, CORES>
where
    M: PhysMapper,
    C: CpuLocal,
{
    /// Create an allocator with every frame reserved and every list empty.
    /// Hand memory over with [`add_free_range`](Self::add_free_range).
    ///
    /// # Safety
    /// - `mapper` must make every byte of `[base, base + FRAMES * PAGE_SIZE)`
    ///   readable and writable.
    /// - Frames seeded into or freed back to the allocator must not be
    ///   accessed by anyone else until they are allocated again.
    ///
    /// # Panics
    /// If `base` is not page aligned, `CORES` is zero, or `FRAMES` does not
    /// fit the `u32` link table.
    pub const unsafe fn new(base: PhysicalAddress, mapper: M, cpu: C, config: AllocatorConfig) -> Self {
        assert!(base.is_page_aligned(), "frame allocator base must be page aligned");
        assert!(CORES > 0, "frame allocator needs at least one core");
        assert!(FRAMES < u32::MAX as usize, "too many frames for u32 links");
        Self {
            base,
            mapper,
            cpu,
            config,
            lists: [const { SpinLock::new(FreeList::new()) }; CORES],
            links: Links::new(),
            refs: SpinLock::new(RefTable::new()),
        }
    }

    /// Hand every whole page in `[start, end)` to the allocator, onto the
    /// calling core's free list. Returns the number of frames added.
    ///
    /// # Safety
    /// The pages must be unused: their contents are overwritten immediately.
    /// Seeding a page twice is a double free and panics.
    pub unsafe fn add_free_range(&self, start: PhysicalAddress, end: PhysicalAddress) -> usize {
        let mut pa = start.page_align_up();
        let mut added = 0;
        while pa.as_u64() + PAGE_SIZE <= end.as_u64() {
            // SAFETY: an unseeded page carries the reservation taken in `new`.
            self.free(unsafe { Frame::from_raw(pa) });
            pa = pa + PAGE_SIZE;
            added += 1;
        }
        info!("frame allocator: seeded {added} frames in [{start}, {end})");
        added
    }

    /// Allocate one frame with a reference count of 1, filled with
    /// [`AllocatorConfig::alloc_fill`].
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] when no core has a free frame left.
    ///
    /// # Panics
    /// If the calling core is not one of `CORES`, or a frame on a free list
    /// still has references.
    pub fn allocate(&self) -> Result<Frame, AllocError> {
        let idx = {
            let _pin = self.cpu.pin();
            let core = self.current_core();
            let local = self.lists[core].lock().pop(&self.links);
            local.or_else(|| self.steal(core))
        };
        let Some(idx) = idx else {
            debug!("frame allocator: out of memory");
            return Err(AllocError::OutOfMemory);
        };

        let idx = idx as usize;
        let pa = self.addr_of(idx);
        let claimed = self.refs.lock().claim(idx);
        assert!(claimed, "allocate: {}", FrameError::StillReferenced(pa));
        // SAFETY: the frame just left a free list; this is the only reference.
        unsafe { self.fill(pa, self.config.alloc_fill) };
        Ok(Frame::new(pa))
    }

    /// Drop one reference. The last reference scrubs the frame with
    /// [`AllocatorConfig::free_fill`] and puts it on the calling core's list.
    ///
    /// # Panics
    /// If the frame is misaligned, outside the managed range, or already free.
    pub fn free(&self, frame: Frame) {
        let pa = frame.into_raw();
        let idx = self.index_of(pa).unwrap_or_else(|e| panic!("free: {e}"));
        let remaining = self.refs.lock().decrement(idx);
        match remaining {
            None => panic!("free: {}", FrameError::NotAllocated(pa)),
            Some(0) => {}
            Some(_) => return,
        }

        // SAFETY: the count reached zero; nobody else can reach the frame.
        unsafe { self.fill(pa, self.config.free_fill) };

        let _pin = self.cpu.pin();
        let core = self.current_core();
        self.lists[core].lock().push(&self.links, link_index(idx));
    }

    /// Register another owner of `frame` and return its handle.
    ///
    /// # Panics
    /// If `frame` is not currently allocated.
    pub fn increment_ref(&self, frame: &Frame) -> Frame {
        let pa = frame.addr();
        let idx = self
            .index_of(pa)
            .unwrap_or_else(|e| panic!("increment_ref: {e}"));
        let count = self.refs.lock().increment(idx);
        assert!(count.is_some(), "increment_ref: {}", FrameError::NotAllocated(pa));
        Frame::new(pa)
    }

    /// Make `frame` safe to write.
    ///
    /// A sole owner keeps its frame. A shared frame is duplicated: a new frame
    /// is allocated, the contents are copied, `frame` is replaced by the copy,
    /// and the caller's reference on the original is dropped.
    ///
    /// The sharing check runs under the reference table lock; allocation and
    /// copy run without it. Owners that drop out in between only make the
    /// final release of the original recycle it.
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if a copy was needed but no frame was free;
    /// `frame` and its count are then unchanged.
    ///
    /// # Panics
    /// If `frame` is not an allocated frame of this allocator.
    pub fn copy_on_write(&self, frame: &mut Frame) -> Result<CopyOnWrite, AllocError> {
        let pa = frame.addr();
        let idx = self
            .index_of(pa)
            .unwrap_or_else(|e| panic!("copy_on_write: {e}"));
        let count = self.refs.lock().get(idx);
        match count {
            0 => panic!("copy_on_write: {}", FrameError::NotAllocated(pa)),
            1 => return Ok(CopyOnWrite::Reused),
            _ => {}
        }

        let copy = self.allocate()?;
        // SAFETY: `copy` is exclusively ours. The original is shared read-only
        // and our reference keeps it allocated for the duration of the copy.
        unsafe {
            ptr::copy_nonoverlapping(
                self.mapper.phys_to_ptr(pa).cast_const(),
                self.mapper.phys_to_ptr(copy.addr()),
                FRAME_BYTES,
            );
        }
        let original = core::mem::replace(frame, copy);
        self.free(original);
        Ok(CopyOnWrite::Copied)
    }

    /// Current reference count of `frame`.
    ///
    /// # Panics
    /// If `frame` is misaligned or outside the managed range.
    pub fn ref_count(&self, frame: &Frame) -> u32 {
        let idx = self
            .index_of(frame.addr())
            .unwrap_or_else(|e| panic!("ref_count: {e}"));
        self.refs.lock().get(idx)
    }

    /// Frames currently on `core`'s free list.
    pub fn free_frames_on(&self, core: usize) -> usize {
        self.lists.get(core).map_or(0, |list| list.lock().len())
    }

    /// Frames on all free lists. Lists are counted one lock at a time, so the
    /// result is exact only while no other core is allocating or freeing.
    pub fn free_frames(&self) -> usize {
        let mut total = 0;
        let kept = visit_in_order(self.lists.iter().enumerate(), |_, list| {
            total += list.len();
            Visit::Release
        });
        debug_assert!(kept.is_none());
        total
    }

    /// Free memory in bytes, as reported to `sysinfo`.
    pub fn free_bytes(&self) -> u64 {
        self.free_frames() as u64 * PAGE_SIZE
    }

    /// Number of frames the allocator was built for.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        FRAMES
    }

    /// Move up to `steal_quota` frames from the first non-empty donor onto
    /// `core`'s list and pop one of them.
    fn steal(&self, core: usize) -> Option<u32> {
        let quota = self.config.steal_quota;
        let mut stolen = None;
        let donors = self
            .lists
            .iter()
            .enumerate()
            .filter(|&(donor, _)| donor != core);
        let kept = visit_in_order(donors, |donor, list| match list.detach(&self.links, quota) {
            None => Visit::Release,
            Some(batch) => {
                trace!("core {core} stole {} frames from core {donor}", batch.len());
                stolen = Some(batch);
                Visit::Stop
            }
        });
        debug_assert!(kept.is_none());

        let batch = stolen?;
        let mut local = self.lists[core].lock();
        local.splice(&self.links, batch);
        local.pop(&self.links)
    }

    fn current_core(&self) -> usize {
        let core = self.cpu.core_id();
        assert!(core < CORES, "{}", FrameError::UnknownCore(core));
        core
    }

    fn index_of(&self, pa: PhysicalAddress) -> Result<usize, FrameError> {
        if !pa.is_page_aligned() {
            return Err(FrameError::Misaligned(pa));
        }
        let offset = pa
            .as_u64()
            .checked_sub(self.base.as_u64())
            .ok_or(FrameError::OutOfRange(pa))?;
        usize::try_from(offset / PAGE_SIZE)
            .ok()
            .filter(|&idx| idx < FRAMES)
            .ok_or(FrameError::OutOfRange(pa))
    }

    fn addr_of(&self, idx: usize) -> PhysicalAddress {
        self.base + idx as u64 * PAGE_SIZE
    }

    /// # Safety
    /// The caller must own the frame exclusively.
    unsafe fn fill(&self, pa: PhysicalAddress, byte: u8) {
        // SAFETY: the mapper covers the managed range and the caller owns the frame.
        unsafe { ptr::write_bytes(self.mapper.phys_to_ptr(pa), byte, FRAME_BYTES) }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn link_index(idx: usize) -> u32 {
    // `new` asserts FRAMES < u32::MAX.
    idx as u32
}
