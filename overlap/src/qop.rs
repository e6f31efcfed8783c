use crate::OverlapError;

use beta::UnitCell;
use linalg::{Gemm, Op};
use matrix::Matrix;
use types::Scalar;

/// Block-diagonal coupling between projectors: one `nbf x nbf` block per
/// atom, shared by all atoms of a type. Either spin independent or one set
/// of blocks per spin.
pub struct QOperator<T: Scalar> {
    // [ispn][itype]
    blocks: Vec<Vec<Matrix<T>>>,
    // (itype, offset, nbf) per atom
    atoms: Vec<(usize, usize, usize)>,
    size: usize,
}

impl<T: Scalar> QOperator<T> {
    pub fn new(uc: &UnitCell, blocks: Vec<Matrix<T>>) -> Result<QOperator<T>, OverlapError> {
        QOperator::with_spins(uc, vec![blocks])
    }

    pub fn with_spins(uc: &UnitCell, blocks: Vec<Vec<Matrix<T>>>) -> Result<QOperator<T>, OverlapError> {
        if blocks.is_empty() || blocks.len() > 2 {
            return Err(OverlapError::QSpins(blocks.len()));
        }

        for (ispn, per_type) in blocks.iter().enumerate() {
            for itype in 0..uc.num_atom_types() {
                let expected = uc.atom_type(itype).num_beta();

                let (nrow, ncol) = per_type.get(itype).map(|q| q.shape()).unwrap_or((0, 0));

                if nrow != expected || ncol != expected {
                    return Err(OverlapError::QBlock {
                        itype,
                        ispn,
                        nrow,
                        ncol,
                        expected,
                    });
                }
            }
        }

        let mut atoms = Vec::with_capacity(uc.num_atoms());
        let mut offset = 0;

        for ia in 0..uc.num_atoms() {
            let nbf = uc.num_beta(ia);
            atoms.push((uc.atom(ia).itype, offset, nbf));
            offset += nbf;
        }

        Ok(QOperator {
            blocks,
            atoms,
            size: offset,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_spin_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block(&self, ispn: usize, itype: usize) -> &Matrix<T> {
        let s = if self.blocks.len() == 1 { 0 } else { ispn };

        assert!(s < self.blocks.len(), "Q operator: spin {} of {} blocks", ispn, self.blocks.len());

        &self.blocks[s][itype]
    }

    /// `B * Q`, `B` has `size()` columns.
    pub fn lmatmul(&self, b: &Matrix<T>, ispn: usize) -> Matrix<T> {
        assert_eq!(b.ncol(), self.size, "Q operator: lmatmul with {} columns, size {}", b.ncol(), self.size);

        let ld = b.nrow();

        let mut out = Matrix::<T>::new(ld, self.size);

        for &(itype, offset, nbf) in self.atoms.iter() {
            let q = self.block(ispn, itype);

            Gemm {
                op_a: Op::N,
                m: ld,
                n: nbf,
                k: nbf,
                alpha: T::one(),
                a: &b.as_slice()[offset * ld..],
                lda: ld,
                b: q.as_slice(),
                ldb: nbf,
                beta: T::zero(),
            }
            .run_host(&mut out.as_mut_slice()[offset * ld..], ld);
        }

        out
    }

    /// `alpha * Q * R`, `R` has `size()` rows.
    pub fn rmatmul(&self, r: &Matrix<T>, ispn: usize, alpha: T) -> Matrix<T> {
        assert_eq!(r.nrow(), self.size, "Q operator: rmatmul with {} rows, size {}", r.nrow(), self.size);

        let ncol = r.ncol();

        let mut out = Matrix::<T>::new(self.size, ncol);

        for &(itype, offset, nbf) in self.atoms.iter() {
            let q = self.block(ispn, itype);

            Gemm {
                op_a: Op::N,
                m: nbf,
                n: ncol,
                k: nbf,
                alpha,
                a: q.as_slice(),
                lda: nbf,
                b: &r.as_slice()[offset..],
                ldb: self.size,
                beta: T::zero(),
            }
            .run_host(&mut out.as_mut_slice()[offset..], self.size);
        }

        out
    }
}
