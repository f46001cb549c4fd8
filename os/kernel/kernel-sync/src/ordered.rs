//! # Ordered visiting of sibling locks
//!
//! Code that must look at a whole family of sibling locks (all hash buckets of
//! a cache, all per-core free lists) goes through [`visit_in_order`]. It takes
//! the locks one at a time in the order the iterator yields them and holds at
//! most two at any instant: the one being inspected and, optionally, one the
//! visitor asked to retain. As long as every caller walks the family in
//! ascending index order, a retained lock always has a lower index than the
//! inspected one, so two visitors can never wait on each other in a cycle.

use crate::{SpinLock, SpinLockGuard};

/// What [`visit_in_order`] does with the lock it just inspected.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Visit {
    /// Unlock it and move on.
    Release,
    /// Keep it locked in place of whatever was retained so far (which is
    /// unlocked) and move on.
    Retain,
    /// Unlock it and end the walk; the retained lock, if any, is kept.
    Stop,
}

/// Lock each `(index, lock)` pair in turn and let `visit` decide its fate.
///
/// Returns the lock retained last, together with its index.
///
/// ```
/// use kernel_sync::{SpinLock, Visit, visit_in_order};
///
/// let lists = [SpinLock::new(3), SpinLock::new(9), SpinLock::new(5)];
/// let mut best = 0;
/// let (idx, guard) = visit_in_order(lists.iter().enumerate(), |_, v| {
///     if *v > best {
///         best = *v;
///         Visit::Retain
///     } else {
///         Visit::Release
///     }
/// })
/// .unwrap();
/// assert_eq!((idx, *guard), (1, 9));
/// assert!(!lists[0].is_locked() && !lists[2].is_locked());
/// ```
pub fn visit_in_order<'a, T, I, F>(locks: I, mut visit: F) -> Option<(usize, SpinLockGuard<'a, T>)>
where
    T: 'a,
    I: IntoIterator<Item = (usize, &'a SpinLock<T>)>,
    F: FnMut(usize, &mut T) -> Visit,
{
    let mut retained: Option<(usize, SpinLockGuard<'a, T>)> = None;
    for (idx, lock) in locks {
        let mut guard = lock.lock();
        match visit(idx, &mut guard) {
            Visit::Release => drop(guard),
            Visit::Retain => {
                // Dropping the old winner after locking the new one keeps the
                // ascending acquisition order intact.
                retained = Some((idx, guard));
            }
            Visit::Stop => {
                drop(guard);
                break;
            }
        }
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_everything_when_nothing_is_retained() {
        let locks = [SpinLock::new(1), SpinLock::new(2), SpinLock::new(3)];
        let mut seen = Vec::new();
        let kept = visit_in_order(locks.iter().enumerate(), |i, v| {
            seen.push((i, *v));
            Visit::Release
        });
        assert!(kept.is_none());
        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3)]);
        assert!(locks.iter().all(|l| !l.is_locked()));
    }

    #[test]
    fn at_most_one_retained_lock_besides_the_current_one() {
        let locks = [SpinLock::new(0), SpinLock::new(0), SpinLock::new(0), SpinLock::new(0)];
        let kept = visit_in_order(locks.iter().enumerate(), |i, _| {
            let held = locks.iter().filter(|l| l.is_locked()).count();
            assert!(held <= 2, "bucket {i}: {held} locks held");
            Visit::Retain
        });
        let (idx, _guard) = kept.unwrap();
        assert_eq!(idx, 3);
        assert_eq!(locks.iter().filter(|l| l.is_locked()).count(), 1);
    }

    #[test]
    fn stop_ends_the_walk_and_keeps_the_winner() {
        let locks = [SpinLock::new(5), SpinLock::new(0), SpinLock::new(7)];
        let mut visited = 0;
        let kept = visit_in_order(locks.iter().enumerate(), |_, v| {
            visited += 1;
            if *v == 5 { Visit::Retain } else { Visit::Stop }
        });
        assert_eq!(visited, 2);
        let (idx, guard) = kept.unwrap();
        assert_eq!((idx, *guard), (0, 5));
        assert!(!locks[1].is_locked() && !locks[2].is_locked());
    }

    #[test]
    fn skipping_an_index_never_locks_it() {
        let locks = [SpinLock::new(0), SpinLock::new(0), SpinLock::new(0)];
        let _held = locks[1].lock();
        let kept = visit_in_order(
            locks.iter().enumerate().filter(|&(i, _)| i != 1),
            |_, _| Visit::Release,
        );
        assert!(kept.is_none());
    }
}
