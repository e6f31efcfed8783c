use crate::{MemoryError, MemoryType};

use log::debug;
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use types::Scalar;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub in_use: usize,
    pub high_water: usize,
    pub num_blocks: usize,
}

/// Process-local allocator for one residency kind. Blocks are borrowed with
/// `acquire` and given back when they are dropped.
#[derive(Debug)]
pub struct MemoryPool {
    kind: MemoryType,
    limit: Option<usize>,
    stats: Mutex<PoolStats>,
}

impl MemoryPool {
    pub fn new(kind: MemoryType, limit: Option<usize>) -> Arc<MemoryPool> {
        Arc::new(MemoryPool {
            kind,
            limit,
            stats: Mutex::new(PoolStats::default()),
        })
    }

    pub fn kind(&self) -> MemoryType {
        self.kind
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    /// Zero-initialised block of `n` elements.
    pub fn acquire<T: Scalar>(self: &Arc<Self>, n: usize) -> Result<PoolBlock<T>, MemoryError> {
        let bytes = n * mem::size_of::<T>();

        {
            let mut stats = self.stats.lock();

            if let Some(limit) = self.limit {
                if stats.in_use + bytes > limit {
                    return Err(MemoryError::Exhausted {
                        kind: self.kind,
                        requested: bytes,
                        in_use: stats.in_use,
                        limit,
                    });
                }
            }

            stats.in_use += bytes;
            stats.num_blocks += 1;
            stats.high_water = stats.high_water.max(stats.in_use);
        }

        debug!("{} pool: acquire {} bytes", self.kind, bytes);

        Ok(PoolBlock {
            data: vec![T::zero(); n],
            bytes,
            pool: Arc::clone(self),
        })
    }

    fn release(&self, bytes: usize) {
        let mut stats = self.stats.lock();

        stats.in_use -= bytes;
        stats.num_blocks -= 1;
    }
}

/// Memory borrowed from a `MemoryPool`.
#[derive(Debug)]
pub struct PoolBlock<T: Scalar> {
    data: Vec<T>,
    bytes: usize,
    pool: Arc<MemoryPool>,
}

impl<T: Scalar> PoolBlock<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn kind(&self) -> MemoryType {
        self.pool.kind()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Scalar> Drop for PoolBlock<T> {
    fn drop(&mut self) {
        self.pool.release(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::c64;

    #[test]
    fn test_pool_accounting() {
        let pool = MemoryPool::new(MemoryType::Device, None);

        let a = pool.acquire::<c64>(100).unwrap();

        {
            let b = pool.acquire::<f64>(50).unwrap();
            assert_eq!(b.len(), 50);

            let st = pool.stats();
            assert_eq!(st.in_use, 1600 + 400);
            assert_eq!(st.num_blocks, 2);
        }

        let st = pool.stats();
        assert_eq!(st.in_use, 1600);
        assert_eq!(st.high_water, 2000);

        drop(a);

        assert_eq!(pool.stats().in_use, 0);
        assert_eq!(pool.stats().num_blocks, 0);
    }

    #[test]
    fn test_pool_limit() {
        let pool = MemoryPool::new(MemoryType::Device, Some(1000));

        let _a = pool.acquire::<f64>(100).unwrap();

        match pool.acquire::<f64>(26) {
            Err(MemoryError::Exhausted { requested, in_use, .. }) => {
                assert_eq!(requested, 208);
                assert_eq!(in_use, 800);
            }
            _ => panic!("expected an exhausted pool"),
        }

        assert!(pool.acquire::<f64>(25).is_ok());
    }
}
