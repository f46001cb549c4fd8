use kernel_bio::{BlockData, BlockDevice, BlockId, Direction};
use kernel_info::param::BSIZE;
use kernel_sync::Yield;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct ThreadYield;

impl Yield for ThreadYield {
    fn yield_now() {
        std::thread::yield_now();
    }
}

/// In-memory disk counting reads per block.
#[derive(Default)]
pub struct MemDisk {
    blocks: Mutex<HashMap<BlockId, BlockData>>,
    reads: Mutex<HashMap<BlockId, usize>>,
}

impl MemDisk {
    pub fn reads_of(&self, dev: u32, block: u32) -> usize {
        let reads = self.reads.lock().unwrap();
        reads.get(&BlockId::new(dev, block)).copied().unwrap_or(0)
    }

    pub fn first_byte(&self, dev: u32, block: u32) -> u8 {
        let blocks = self.blocks.lock().unwrap();
        blocks.get(&BlockId::new(dev, block)).map_or(0, |d| d[0])
    }
}

impl BlockDevice for MemDisk {
    fn transfer(&self, block: BlockId, data: &mut BlockData, direction: Direction) {
        match direction {
            Direction::Read => {
                *self.reads.lock().unwrap().entry(block).or_default() += 1;
                *data = self
                    .blocks
                    .lock()
                    .unwrap()
                    .get(&block)
                    .copied()
                    .unwrap_or([0; BSIZE]);
            }
            Direction::Write => {
                self.blocks.lock().unwrap().insert(block, *data);
            }
        }
    }
}
