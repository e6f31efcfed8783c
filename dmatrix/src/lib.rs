use dwmpi::Communicator;
use std::sync::Arc;
use thiserror::Error;

mod dmatrix;
pub use crate::dmatrix::*;

#[derive(Debug, Error)]
pub enum DMatrixError {
    #[error("{nrow}x{ncol} process grid does not match a communicator of {size} ranks")]
    GridSize { nrow: usize, ncol: usize, size: usize },

    #[error("block size {bs_row}x{bs_col} must be positive")]
    BlockSize { bs_row: usize, bs_col: usize },
}

/// 2-D process grid over a communicator; ranks are laid out row-major.
pub struct BlacsGrid {
    comm: Arc<dyn Communicator>,
    nrow: usize,
    ncol: usize,
    rank_row: usize,
    rank_col: usize,
}

impl BlacsGrid {
    pub fn new(comm: Arc<dyn Communicator>, num_ranks_row: usize, num_ranks_col: usize) -> Result<BlacsGrid, DMatrixError> {
        if num_ranks_row * num_ranks_col != comm.size() || num_ranks_row == 0 {
            return Err(DMatrixError::GridSize {
                nrow: num_ranks_row,
                ncol: num_ranks_col,
                size: comm.size(),
            });
        }

        let rank = comm.rank();

        Ok(BlacsGrid {
            rank_row: rank / num_ranks_col,
            rank_col: rank % num_ranks_col,
            comm,
            nrow: num_ranks_row,
            ncol: num_ranks_col,
        })
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn num_ranks_row(&self) -> usize {
        self.nrow
    }

    pub fn num_ranks_col(&self) -> usize {
        self.ncol
    }

    pub fn size(&self) -> usize {
        self.nrow * self.ncol
    }

    pub fn rank_row(&self) -> usize {
        self.rank_row
    }

    pub fn rank_col(&self) -> usize {
        self.rank_col
    }

    /// Communicator rank of grid coordinate (row, col).
    pub fn rank(&self, row: usize, col: usize) -> usize {
        row * self.ncol + col
    }

    pub fn coords(&self, rank: usize) -> (usize, usize) {
        (rank / self.ncol, rank % self.ncol)
    }
}

#[cfg(test)]
mod tests;
