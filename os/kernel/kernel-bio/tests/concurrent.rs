mod common;

use common::{MemDisk, ThreadYield};
use kernel_bio::BufferCache;
use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

type Cache = BufferCache<MemDisk, ThreadYield, 8, 3>;

#[test]
fn concurrent_acquires_of_one_block_share_one_buffer() {
    let threads = 8;
    let cache = Arc::new(Cache::new(MemDisk::default()));
    let start = Arc::new(Barrier::new(threads));
    let seen = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                start.wait();
                for _ in 0..200 {
                    let buf = cache.acquire(1, 5);
                    seen.lock().unwrap().insert(buf.as_ptr() as usize);
                    cache.release(buf);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(cache.device().reads_of(1, 5), 1);
    assert_eq!(cache.stats().misses(), 1);
    assert_eq!(cache.ref_count(1, 5), 0);
}

#[test]
fn churn_never_loses_an_update_or_duplicates_a_block() {
    let threads = 8;
    let rounds = 150;
    let blocks = 12;
    let cache = Arc::new(Cache::new(MemDisk::default()));
    let start = Arc::new(Barrier::new(threads));
    let expected = Arc::new(Mutex::new(vec![0u8; blocks]));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            let expected = Arc::clone(&expected);
            thread::spawn(move || {
                start.wait();
                for i in 0..rounds {
                    let block = (i * 7 + t * 5) % blocks;
                    let mut buf = cache.acquire(1, u32::try_from(block).unwrap());
                    buf[0] = buf[0].wrapping_add(1);
                    cache.commit(&mut buf);
                    cache.release(buf);
                    let mut exp = expected.lock().unwrap();
                    exp[block] = exp[block].wrapping_add(1);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let expected = expected.lock().unwrap();
    for (block, &count) in expected.iter().enumerate() {
        let block = u32::try_from(block).unwrap();
        assert_eq!(cache.device().first_byte(1, block), count, "block {block}");
        let buf = cache.acquire(1, block);
        assert_eq!(buf[0], count, "block {block}");
        drop(buf);
    }

    let mut resident = HashSet::new();
    cache.for_each_resident(|id, refcnt| {
        assert!(resident.insert(id), "{id} cached twice");
        assert_eq!(refcnt, 0);
    });
    assert_eq!(resident.len(), 8);
}

#[test]
fn pinned_block_survives_concurrent_churn() {
    let threads = 4;
    let cache = Arc::new(Cache::new(MemDisk::default()));
    let buf = cache.acquire(2, 1);
    let pin = cache.pin(&buf);
    cache.release(buf);

    let start = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            let offset = u32::try_from(t).unwrap();
            thread::spawn(move || {
                start.wait();
                for i in 0..300u32 {
                    let block = 100 + (i + offset) % 20;
                    let buf = cache.acquire(1, block);
                    cache.release(buf);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let again = cache.acquire(2, 1);
    assert!(!again.read_from_disk());
    drop(again);
    cache.unpin(pin);
    assert_eq!(cache.device().reads_of(2, 1), 1);
    assert!(cache.stats().evictions() > 0);
}
