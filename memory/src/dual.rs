use crate::{MemoryError, MemoryPool, MemoryType, PoolBlock};

use std::sync::Arc;
use types::Scalar;

/// Column-major 2-D array resident on the host with an optional device
/// copy. The two copies are only synchronised by `copy_to`.
#[derive(Debug)]
pub struct DualArray<T: Scalar> {
    nrow: usize,
    ncol: usize,
    host: Vec<T>,
    device: Option<PoolBlock<T>>,
}

impl<T: Scalar> DualArray<T> {
    pub fn new(nrow: usize, ncol: usize) -> DualArray<T> {
        DualArray {
            nrow,
            ncol,
            host: vec![T::zero(); nrow * ncol],
            device: None,
        }
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn len(&self) -> usize {
        self.nrow * self.ncol
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn on_device(&self) -> bool {
        self.device.is_some()
    }

    /// The host copy always exists; allocating it again is a no-op.
    pub fn allocate(&mut self, mem: MemoryType, pool: &Arc<MemoryPool>) -> Result<(), MemoryError> {
        if mem == MemoryType::Device && self.device.is_none() {
            assert_eq!(pool.kind(), MemoryType::Device, "DualArray::allocate: device buffer from a host pool");

            self.device = Some(pool.acquire(self.len())?);
        }

        Ok(())
    }

    pub fn deallocate(&mut self, mem: MemoryType) {
        if mem == MemoryType::Device {
            self.device = None;
        }
    }

    /// Copy the whole array into residency `mem` from the other one.
    pub fn copy_to(&mut self, mem: MemoryType) {
        self.copy_cols_to(mem, 0, self.ncol);
    }

    pub fn copy_cols_to(&mut self, mem: MemoryType, j0: usize, n: usize) {
        assert!(j0 + n <= self.ncol, "DualArray::copy_cols_to: columns {}..{} of {}", j0, j0 + n, self.ncol);

        let range = j0 * self.nrow..(j0 + n) * self.nrow;

        let device = match self.device.as_mut() {
            Some(d) => d,
            None => panic!("DualArray::copy_cols_to({}): device buffer is not allocated", mem),
        };

        match mem {
            MemoryType::Device => device.as_mut_slice()[range.clone()].copy_from_slice(&self.host[range]),
            MemoryType::Host => self.host[range.clone()].copy_from_slice(&device.as_slice()[range]),
        }
    }

    pub fn at(&self, mem: MemoryType) -> &[T] {
        match mem {
            MemoryType::Host => &self.host,
            MemoryType::Device => match self.device.as_ref() {
                Some(d) => d.as_slice(),
                None => panic!("DualArray::at: device buffer is not allocated"),
            },
        }
    }

    pub fn at_mut(&mut self, mem: MemoryType) -> &mut [T] {
        match mem {
            MemoryType::Host => &mut self.host,
            MemoryType::Device => match self.device.as_mut() {
                Some(d) => d.as_mut_slice(),
                None => panic!("DualArray::at_mut: device buffer is not allocated"),
            },
        }
    }

    pub fn col(&self, mem: MemoryType, j: usize) -> &[T] {
        let nrow = self.nrow;

        &self.at(mem)[j * nrow..(j + 1) * nrow]
    }

    pub fn col_mut(&mut self, mem: MemoryType, j: usize) -> &mut [T] {
        let nrow = self.nrow;

        &mut self.at_mut(mem)[j * nrow..(j + 1) * nrow]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_copies() {
        let pool = MemoryPool::new(MemoryType::Device, None);

        let mut a = DualArray::<f64>::new(3, 4);

        a.at_mut(MemoryType::Host).iter_mut().enumerate().for_each(|(i, x)| *x = i as f64);

        a.allocate(MemoryType::Device, &pool).unwrap();
        assert_eq!(pool.stats().in_use, 12 * 8);

        // nothing moves until asked to
        assert!(a.at(MemoryType::Device).iter().all(|&x| x == 0.0));

        a.copy_cols_to(MemoryType::Device, 1, 2);
        assert_eq!(a.col(MemoryType::Device, 0), &[0.0, 0.0, 0.0]);
        assert_eq!(a.col(MemoryType::Device, 2), &[6.0, 7.0, 8.0]);

        a.col_mut(MemoryType::Device, 2)[0] = -1.0;
        a.copy_to(MemoryType::Host);
        assert_eq!(a.col(MemoryType::Host, 2), &[-1.0, 7.0, 8.0]);
        assert_eq!(a.col(MemoryType::Host, 3), &[0.0, 0.0, 0.0]);

        a.deallocate(MemoryType::Device);
        assert!(!a.on_device());
        assert_eq!(pool.stats().in_use, 0);
    }

    #[test]
    #[should_panic(expected = "device buffer is not allocated")]
    fn test_device_view_requires_allocation() {
        let a = DualArray::<f64>::new(2, 2);

        a.at(MemoryType::Device);
    }
}
