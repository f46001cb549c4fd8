use core::sync::atomic::{AtomicU32, Ordering};

/// Sentinel for "no next frame".
const NIL: u32 = u32::MAX;

/// Next-links of the free lists, one slot per managed frame.
///
/// A free frame belongs to exactly one [`FreeList`] and its slot is only read
/// or written by whoever holds that list's lock (or by the thread that has a
/// detached [`Batch`] in hand). The slots are atomics so that the table can be
/// shared between all lists without aliasing `&mut`; the list locks provide
/// the ordering, so relaxed accesses suffice.
///
/// Keeping the links out of the frames themselves means freed memory is never
/// interpreted as list structure, and junk-filling a freed frame cannot
/// corrupt the allocator.
pub(crate) struct Links<const N: usize> {
    next: [AtomicU32; N],
}

impl<const N: usize> Links<N> {
    pub(crate) const fn new() -> Self {
        Self {
            next: [const { AtomicU32::new(NIL) }; N],
        }
    }

    #[inline]
    fn next(&self, idx: u32) -> u32 {
        self.next[idx as usize].load(Ordering::Relaxed)
    }

    #[inline]
    fn set_next(&self, idx: u32, next: u32) {
        self.next[idx as usize].store(next, Ordering::Relaxed);
    }
}

/// A chain of frames detached from one list on its way to another.
///
/// Owning a `Batch` means owning the frames in it: nobody else can reach them
/// until the batch is [spliced](FreeList::splice) into a list.
#[must_use = "frames in a detached batch are lost unless spliced into a list"]
pub(crate) struct Batch {
    head: u32,
    tail: u32,
    len: usize,
}

impl Batch {
    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }
}

/// LIFO list of free frame indices, threaded through [`Links`].
pub(crate) struct FreeList {
    head: u32,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: NIL, len: 0 }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push<const N: usize>(&mut self, links: &Links<N>, idx: u32) {
        links.set_next(idx, self.head);
        self.head = idx;
        self.len += 1;
    }

    pub(crate) fn pop<const N: usize>(&mut self, links: &Links<N>) -> Option<u32> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        self.head = links.next(idx);
        links.set_next(idx, NIL);
        self.len -= 1;
        Some(idx)
    }

    /// Cut up to `max` frames off the front of the list.
    ///
    /// Returns `None` if the list is empty or `max` is zero.
    pub(crate) fn detach<const N: usize>(&mut self, links: &Links<N>, max: usize) -> Option<Batch> {
        if self.head == NIL || max == 0 {
            return None;
        }
        let head = self.head;
        let mut tail = head;
        let mut len = 1;
        while len < max {
            let next = links.next(tail);
            if next == NIL {
                break;
            }
            tail = next;
            len += 1;
        }
        self.head = links.next(tail);
        links.set_next(tail, NIL);
        self.len -= len;
        Some(Batch { head, tail, len })
    }

    /// Prepend a detached batch.
    pub(crate) fn splice<const N: usize>(&mut self, links: &Links<N>, Batch { head, tail, len }: Batch) {
        links.set_next(tail, self.head);
        self.head = head;
        self.len += len;
    }
}
