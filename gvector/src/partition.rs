use crate::{GVector, GvecError};

use dwmpi::Communicator;
use splindex::Block;
use std::ops::Range;
use std::sync::Arc;

/// Contiguous split of the ordered G+k set over the ranks of a
/// communicator.
pub struct GvecPartition {
    gvec: GVector,
    comm: Arc<dyn Communicator>,
    split: Block,
}

impl GvecPartition {
    pub fn new(gvec: GVector, comm: Arc<dyn Communicator>) -> Result<GvecPartition, GvecError> {
        let split = Block::new(gvec.num_gvec(), comm.size());

        let local = split.local_size(comm.rank()) as u64;

        let counts = dwmpi::allgather(comm.as_ref(), &[local, gvec.num_gvec() as u64]);

        let mut sum = 0;

        for (rank, c) in counts.chunks(2).enumerate() {
            if c[1] as usize != gvec.num_gvec() {
                return Err(GvecError::CountMismatch {
                    rank,
                    found: c[1] as usize,
                    expected: gvec.num_gvec(),
                });
            }

            sum += c[0] as usize;
        }

        if sum != gvec.num_gvec() {
            return Err(GvecError::PartitionMismatch {
                sum,
                num_gvec: gvec.num_gvec(),
            });
        }

        Ok(GvecPartition { gvec, comm, split })
    }

    pub fn gvec(&self) -> &GVector {
        &self.gvec
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn comm_arc(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }

    pub fn num_gvec(&self) -> usize {
        self.gvec.num_gvec()
    }

    /// Local number of G-vectors.
    pub fn count(&self) -> usize {
        self.split.local_size(self.comm.rank())
    }

    /// Global index of the first local G-vector.
    pub fn offset(&self) -> usize {
        self.split.offset(self.comm.rank())
    }

    pub fn range(&self) -> Range<usize> {
        self.split.range(self.comm.rank())
    }

    pub fn gvec_count(&self, rank: usize) -> usize {
        self.split.local_size(rank)
    }

    /// Cartesian G+k of a local G-vector.
    pub fn cart_local(&self, igloc: usize) -> [f64; 3] {
        self.gvec.cart(self.offset() + igloc)
    }

    pub fn frac_local(&self, igloc: usize) -> [f64; 3] {
        self.gvec.frac(self.offset() + igloc)
    }
}
