//! Reusable, aligned symbol-sized buffers, so repeated `encode`/`decode_bytes`
//! calls on the same block don't allocate a fresh `Vec<u8>` every time.
//!
//! Grounded on the teacher's `optimize::MemoryPool`
//! (`Arc<ArrayQueue<AlignedBox<[u8]>>>`, `alloc`/`free` zeroing the block
//! before it goes back on the queue).

use std::sync::Arc;

use aligned_box::AlignedBox;
use crossbeam_queue::ArrayQueue;

const MIN_ALIGN: usize = 32;

/// A bounded pool of zeroed, aligned buffers all of the same `block_size`.
pub struct SymbolPool {
    pool: Arc<ArrayQueue<AlignedBox<[u8]>>>,
    block_size: usize,
}

impl SymbolPool {
    pub fn new(capacity: usize, block_size: usize) -> Self {
        SymbolPool {
            pool: Arc::new(ArrayQueue::new(capacity.max(1))),
            block_size,
        }
    }

    /// Pops a buffer off the pool, or allocates a fresh zeroed one if empty.
    pub fn alloc(&self) -> AlignedBox<[u8]> {
        self.pool
            .pop()
            .unwrap_or_else(|| AlignedBox::<[u8]>::new_zeroed(self.block_size, MIN_ALIGN))
    }

    /// Zeroes `block` and returns it to the pool; dropped instead if the
    /// pool is already at capacity.
    pub fn free(&self, mut block: AlignedBox<[u8]>) {
        block.iter_mut().for_each(|b| *b = 0);
        let _ = self.pool.push(block);
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_reuses_freed_block() {
        let pool = SymbolPool::new(2, 16);
        let mut a = pool.alloc();
        a[0] = 7;
        pool.free(a);
        let b = pool.alloc();
        assert_eq!(&b[..], &[0u8; 16]);
    }

    #[test]
    fn alloc_allocates_fresh_block_when_pool_empty() {
        let pool = SymbolPool::new(1, 8);
        let block = pool.alloc();
        assert_eq!(block.len(), 8);
    }
}
