use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Error;
use crate::random_access::{CancelToken, RandomAccess};

/// Default block size used by [`BlockCache::new`] (spec §4.1).
pub const DEFAULT_BLOCK_SIZE: u64 = 32 * 1024;
/// Default resident block count used by [`BlockCache::new`].
pub const DEFAULT_MAX_BLOCKS: usize = 4;

struct CachedBlock {
    data: Vec<u8>,
    /// Monotonic tick at last access, used to find the LRU entry.
    last_used: u64,
}

/// An LRU block cache wrapping a [`RandomAccess`] source (C2). Reads are
/// rounded to block boundaries, missing runs are fetched with one
/// contiguous underlying read each, and the cache never prefetches beyond
/// the requested range.
pub struct BlockCache<S: RandomAccess> {
    source: S,
    block_size: u64,
    max_blocks: usize,
    blocks: Mutex<HashMap<u64, CachedBlock>>,
    tick: Mutex<u64>,
}

impl<S: RandomAccess> BlockCache<S> {
    /// Wrap `source` with the spec's default block size (32 KiB) and
    /// resident block count (4).
    pub fn new(source: S) -> Self {
        Self::with_config(source, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_BLOCKS)
    }

    /// Wrap `source` with an explicit block size and resident block count.
    /// `max_blocks == 0` degenerates to pass-through: no bytes are retained
    /// between calls.
    pub fn with_config(source: S, block_size: u64, max_blocks: usize) -> Self {
        assert!(block_size > 0, "block_size must be nonzero");
        BlockCache {
            source,
            block_size,
            max_blocks,
            blocks: Mutex::new(HashMap::new()),
            tick: Mutex::new(0),
        }
    }

    /// Total size of the underlying source.
    pub fn size(&self) -> Result<u64, Error> {
        self.source.size()
    }

    /// Read `length` bytes at `offset`, fulfilling from cached blocks where
    /// possible and issuing one contiguous read per run of missing blocks.
    pub fn read(&self, offset: u64, length: u64, cancel: &CancelToken) -> Result<Vec<u8>, Error> {
        if length == 0 {
            return Ok(Vec::new());
        }
        if self.max_blocks == 0 {
            return self.source.read(offset, length, cancel);
        }

        let first_block = offset / self.block_size;
        let last_block = (offset + length - 1) / self.block_size;

        let mut result = Vec::with_capacity(length as usize);
        let mut block_idx = first_block;
        while block_idx <= last_block {
            // Find a contiguous run of missing blocks starting here.
            let run_start = block_idx;
            let mut run_end = block_idx;
            {
                let blocks = self.blocks.lock().unwrap();
                while run_end <= last_block && !blocks.contains_key(&run_end) {
                    run_end += 1;
                }
            }
            if run_end > run_start {
                let fetch_offset = run_start * self.block_size;
                let fetch_len = (run_end - run_start) * self.block_size;
                let fetched = self.source.read(fetch_offset, fetch_len, cancel)?;
                self.insert_run(run_start, fetch_len, &fetched);
                block_idx = run_end;
                continue;
            }
            block_idx += 1;
        }

        let blocks = self.blocks.lock().unwrap();
        let mut tick = self.tick.lock().unwrap();
        for b in first_block..=last_block {
            *tick += 1;
            if let Some(cached) = blocks.get(&b) {
                let block_start = b * self.block_size;
                let want_start = offset.max(block_start);
                let want_end = (offset + length).min(block_start + cached.data.len() as u64);
                if want_start < want_end {
                    let local_start = (want_start - block_start) as usize;
                    let local_end = (want_end - block_start) as usize;
                    result.extend_from_slice(&cached.data[local_start..local_end]);
                }
            }
        }
        drop(blocks);
        drop(tick);
        self.evict_if_needed();
        Ok(result)
    }

    fn insert_run(&self, run_start: u64, fetch_len: u64, fetched: &[u8]) {
        let mut blocks = self.blocks.lock().unwrap();
        let mut tick = self.tick.lock().unwrap();
        let block_count = fetch_len.div_ceil(self.block_size);
        for i in 0..block_count {
            let block_idx = run_start + i;
            let local_start = (i * self.block_size) as usize;
            let local_end = ((i + 1) * self.block_size).min(fetched.len() as u64) as usize;
            if local_start >= fetched.len() {
                break;
            }
            *tick += 1;
            blocks.insert(
                block_idx,
                CachedBlock { data: fetched[local_start..local_end].to_vec(), last_used: *tick },
            );
        }
    }

    fn evict_if_needed(&self) {
        let mut blocks = self.blocks.lock().unwrap();
        while blocks.len() > self.max_blocks {
            let lru_key = blocks
                .iter()
                .min_by_key(|(_, v)| v.last_used)
                .map(|(k, _)| *k);
            if let Some(k) = lru_key {
                blocks.remove(&k);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random_access::MemoryAccess;

    #[test]
    fn reads_exact_subrange_across_block_boundary() {
        let data: Vec<u8> = (0..200u16).map(|i| (i % 256) as u8).collect();
        let cache = BlockCache::with_config(MemoryAccess::new(data.clone()), 16, 4);
        let cancel = CancelToken::new();
        let got = cache.read(10, 30, &cancel).unwrap();
        assert_eq!(got, data[10..40]);
    }

    #[test]
    fn evicts_lru_beyond_max_blocks() {
        let data = vec![0u8; 160];
        let cache = BlockCache::with_config(MemoryAccess::new(data), 16, 2);
        let cancel = CancelToken::new();
        cache.read(0, 16, &cancel).unwrap();
        cache.read(16, 16, &cancel).unwrap();
        cache.read(32, 16, &cancel).unwrap();
        assert_eq!(cache.blocks.lock().unwrap().len(), 2);
    }

    #[test]
    fn zero_max_blocks_is_pass_through() {
        let data = b"0123456789".to_vec();
        let cache = BlockCache::with_config(MemoryAccess::new(data), 4, 0);
        let cancel = CancelToken::new();
        let got = cache.read(2, 5, &cancel).unwrap();
        assert_eq!(got, b"23456");
        assert_eq!(cache.blocks.lock().unwrap().len(), 0);
    }
}
