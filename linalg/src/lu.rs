use crate::LinalgError;

use log::debug;
use matrix::Matrix;
use nalgebra::{linalg::LU, DMatrix, Dyn};
use types::Scalar;

/// LU factorisation with partial pivoting of a square matrix.
pub struct LuFactor<T: Scalar> {
    n: usize,
    lu: LU<T, Dyn, Dyn>,
}

/// Factorise `mat`; a pivot below `n * eps` relative to the largest one is
/// reported as singular.
pub fn lu_factor<T: Scalar>(mat: &Matrix<T>) -> Result<LuFactor<T>, LinalgError> {
    let (nrow, ncol) = mat.shape();

    if nrow != ncol {
        return Err(LinalgError::NotSquare { nrow, ncol });
    }

    let n = nrow;

    let lu = DMatrix::<T>::from_column_slice(n, n, mat.as_slice()).lu();

    let u = lu.u();

    let mut min_pivot = f64::MAX;
    let mut max_pivot: f64 = 0.0;

    for i in 0..n {
        let p = u[(i, i)].modulus_f64();

        min_pivot = min_pivot.min(p);
        max_pivot = max_pivot.max(p);
    }

    if n > 0 && (max_pivot == 0.0 || min_pivot <= n as f64 * T::EPSILON * max_pivot) {
        return Err(LinalgError::Singular {
            n,
            min_pivot,
            max_pivot,
        });
    }

    debug!("lu_factor: {}x{} pivots in [{:.3e}, {:.3e}]", n, n, min_pivot, max_pivot);

    Ok(LuFactor { n, lu })
}

impl<T: Scalar> LuFactor<T> {
    pub fn size(&self) -> usize {
        self.n
    }

    /// Overwrite `b` with the solution of `A x = b`.
    pub fn solve_in_place(&self, b: &mut Matrix<T>) {
        assert_eq!(
            b.nrow(),
            self.n,
            "LuFactor::solve_in_place: rhs has {} rows, factor is {}x{}",
            b.nrow(),
            self.n,
            self.n
        );

        let mut x = DMatrix::<T>::from_column_slice(b.nrow(), b.ncol(), b.as_slice());

        let ok = self.lu.solve_mut(&mut x);

        assert!(ok, "LuFactor::solve_in_place on a singular factor");

        b.as_mut_slice().copy_from_slice(x.as_slice());
    }
}
