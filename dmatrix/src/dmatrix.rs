use crate::{BlacsGrid, DMatrixError};

use log::debug;
use matrix::Matrix;
use memory::{DualArray, MemoryError, MemoryPool, MemoryType};
use splindex::BlockCyclic;
use std::sync::Arc;
use types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub rank: usize,
    pub local_row: usize,
    pub local_col: usize,
}

/// Dense matrix distributed block-cyclically over a `BlacsGrid`. The local
/// panel is column-major with leading dimension `num_rows_local()`.
pub struct DMatrix<T: Scalar> {
    num_rows: usize,
    num_cols: usize,
    grid: Arc<BlacsGrid>,
    spl_row: BlockCyclic,
    spl_col: BlockCyclic,
    data: DualArray<T>,
}

impl<T: Scalar> DMatrix<T> {
    pub fn new(
        num_rows: usize,
        num_cols: usize,
        grid: &Arc<BlacsGrid>,
        bs_row: usize,
        bs_col: usize,
    ) -> Result<DMatrix<T>, DMatrixError> {
        if bs_row == 0 || bs_col == 0 {
            return Err(DMatrixError::BlockSize { bs_row, bs_col });
        }

        let spl_row = BlockCyclic::new(num_rows, grid.num_ranks_row(), bs_row);
        let spl_col = BlockCyclic::new(num_cols, grid.num_ranks_col(), bs_col);

        let nrl = spl_row.local_size(grid.rank_row());
        let ncl = spl_col.local_size(grid.rank_col());

        debug!(
            "dmatrix {}x{} on {}x{} grid, block {}x{}: local {}x{}",
            num_rows,
            num_cols,
            grid.num_ranks_row(),
            grid.num_ranks_col(),
            bs_row,
            bs_col,
            nrl,
            ncl
        );

        Ok(DMatrix {
            num_rows,
            num_cols,
            grid: Arc::clone(grid),
            spl_row,
            spl_col,
            data: DualArray::new(nrl, ncl),
        })
    }

    /// Distributes a matrix every rank holds in full.
    pub fn from_global(
        mat: &Matrix<T>,
        grid: &Arc<BlacsGrid>,
        bs_row: usize,
        bs_col: usize,
    ) -> Result<DMatrix<T>, DMatrixError> {
        let mut dm = DMatrix::new(mat.nrow(), mat.ncol(), grid, bs_row, bs_col)?;

        dm.fill_global(|i, j| mat[[i, j]]);

        Ok(dm)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn bs_row(&self) -> usize {
        self.spl_row.block_size()
    }

    pub fn bs_col(&self) -> usize {
        self.spl_col.block_size()
    }

    pub fn grid(&self) -> &BlacsGrid {
        &self.grid
    }

    pub fn spl_row(&self) -> &BlockCyclic {
        &self.spl_row
    }

    pub fn spl_col(&self) -> &BlockCyclic {
        &self.spl_col
    }

    pub fn num_rows_local(&self) -> usize {
        self.data.nrow()
    }

    pub fn num_cols_local(&self) -> usize {
        self.data.ncol()
    }

    pub fn locate(&self, i: usize, j: usize) -> Location {
        assert!(
            i < self.num_rows && j < self.num_cols,
            "DMatrix::locate: ({}, {}) outside {}x{}",
            i,
            j,
            self.num_rows,
            self.num_cols
        );

        Location {
            rank: self.grid.rank(self.spl_row.owner(i), self.spl_col.owner(j)),
            local_row: self.spl_row.local_index(i),
            local_col: self.spl_col.local_index(j),
        }
    }

    /// Global index of a local entry of this rank.
    pub fn local_to_global(&self, il: usize, jl: usize) -> (usize, usize) {
        (
            self.spl_row.global_index(il, self.grid.rank_row()),
            self.spl_col.global_index(jl, self.grid.rank_col()),
        )
    }

    fn owned_index(&self, i: usize, j: usize) -> Option<usize> {
        let loc = self.locate(i, j);

        if loc.rank == self.grid.comm().rank() {
            Some(loc.local_col * self.num_rows_local() + loc.local_row)
        } else {
            None
        }
    }

    /// Writes the entry if this rank owns it; returns whether it did.
    pub fn set(&mut self, i: usize, j: usize, v: T) -> bool {
        match self.owned_index(i, j) {
            Some(idx) => {
                self.data.at_mut(MemoryType::Host)[idx] = v;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        self.owned_index(i, j).map(|idx| self.data.at(MemoryType::Host)[idx])
    }

    pub fn fill_global<F: Fn(usize, usize) -> T>(&mut self, f: F) {
        let nrl = self.num_rows_local();
        let ncl = self.num_cols_local();

        for jl in 0..ncl {
            for il in 0..nrl {
                let (i, j) = self.local_to_global(il, jl);

                self.data.at_mut(MemoryType::Host)[jl * nrl + il] = f(i, j);
            }
        }
    }

    pub fn zero(&mut self) {
        self.data.at_mut(MemoryType::Host).iter_mut().for_each(|x| *x = T::zero());
    }

    pub fn set_identity(&mut self) {
        self.fill_global(|i, j| if i == j { T::one() } else { T::zero() });
    }

    /// Assembles the full matrix on every rank of the grid.
    pub fn gather(&self) -> Matrix<T> {
        let comm = self.grid.comm();

        let pieces = dwmpi::allgatherv(comm, self.data.at(MemoryType::Host));

        let mut full = Matrix::new(self.num_rows, self.num_cols);

        for (rank, piece) in pieces.iter().enumerate() {
            let (prow, pcol) = self.grid.coords(rank);

            let nrl = self.spl_row.local_size(prow);
            let ncl = self.spl_col.local_size(pcol);

            assert_eq!(piece.len(), nrl * ncl, "DMatrix::gather: rank {} sent a wrong panel", rank);

            for jl in 0..ncl {
                let j = self.spl_col.global_index(jl, pcol);

                for il in 0..nrl {
                    let i = self.spl_row.global_index(il, prow);

                    full[[i, j]] = piece[jl * nrl + il];
                }
            }
        }

        full
    }

    pub fn local(&self) -> &DualArray<T> {
        &self.data
    }

    pub fn allocate(&mut self, mem: MemoryType, pool: &Arc<MemoryPool>) -> Result<(), MemoryError> {
        self.data.allocate(mem, pool)
    }

    pub fn deallocate(&mut self, mem: MemoryType) {
        self.data.deallocate(mem)
    }

    pub fn copy_to(&mut self, mem: MemoryType) {
        self.data.copy_to(mem)
    }
}
