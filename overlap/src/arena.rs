use crate::{ApplyOperator, OverlapError};

use dwmpi::Communicator;
use log::info;
use matrix::Matrix;
use splindex::Block;
use std::collections::BTreeMap;
use std::ops::Range;
use types::Scalar;

/// (k-point, spin)
pub type OperatorKey = (usize, usize);

/// k-points handled by this rank of the k-point communicator.
pub fn local_kpoints(num_kpoints: usize, comm: &dyn Communicator) -> Range<usize> {
    Block::new(num_kpoints, comm.size()).range(comm.rank())
}

/// Operators of the local k-points, one per (k-point, spin), owned by the
/// map and handed out as borrows.
pub struct OverlapOperators<Op> {
    ops: BTreeMap<OperatorKey, Op>,
}

impl<Op> Default for OverlapOperators<Op> {
    fn default() -> Self {
        OverlapOperators { ops: BTreeMap::new() }
    }
}

impl<Op> OverlapOperators<Op> {
    pub fn new() -> OverlapOperators<Op> {
        OverlapOperators::default()
    }

    /// Builds `make(ik, ispn)` for every local k-point and spin.
    pub fn build<F>(num_kpoints: usize, num_spins: usize, comm: &dyn Communicator, mut make: F) -> Result<Self, OverlapError>
    where
        F: FnMut(usize, usize) -> Result<Op, OverlapError>,
    {
        let kpts = local_kpoints(num_kpoints, comm);

        let mut ops = OverlapOperators::new();

        for ik in kpts.clone() {
            for ispn in 0..num_spins {
                ops.insert((ik, ispn), make(ik, ispn)?);
            }
        }

        info!(
            "rank {}: {} overlap operators for k-points {}..{} of {}",
            comm.rank(),
            ops.len(),
            kpts.start,
            kpts.end,
            num_kpoints
        );

        Ok(ops)
    }

    pub fn insert(&mut self, key: OperatorKey, op: Op) -> Option<Op> {
        self.ops.insert(key, op)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Keys in ascending (k-point, spin) order.
    pub fn get_keys(&self) -> Vec<OperatorKey> {
        self.ops.keys().copied().collect()
    }

    pub fn get(&self, key: OperatorKey) -> Option<&Op> {
        self.ops.get(&key)
    }

    pub fn apply<T: Scalar>(&self, key: OperatorKey, y: &mut Matrix<T>, x: &Matrix<T>) -> Result<(), OverlapError>
    where
        Op: ApplyOperator<T>,
    {
        let (ik, ispn) = key;

        let op = self.ops.get(&key).ok_or(OverlapError::UnknownKey { ik, ispn })?;

        op.apply_to(y, x)
    }
}
