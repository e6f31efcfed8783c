use itertools::multizip;
use std::fmt;
use std::ops::{Index, IndexMut};
use types::Scalar;

mod hermitian;
pub use hermitian::*;

/// Column-major dense matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix<T> {
    nrow: usize,
    ncol: usize,
    data: Vec<T>,
}

pub trait Dot<Rhs> {
    type Output;

    fn dot(&self, rhs: &Rhs) -> Self::Output;
}

impl<T: Scalar> Matrix<T> {
    pub fn new(nrow: usize, ncol: usize) -> Matrix<T> {
        Matrix {
            nrow,
            ncol,
            data: vec![T::zero(); nrow * ncol],
        }
    }

    pub fn from_column_slice(nrow: usize, ncol: usize, data: &[T]) -> Matrix<T> {
        assert_eq!(data.len(), nrow * ncol, "Matrix::from_column_slice size");

        Matrix {
            nrow,
            ncol,
            data: data.to_vec(),
        }
    }

    pub fn from_row_slice(nrow: usize, ncol: usize, data: &[T]) -> Matrix<T> {
        assert_eq!(data.len(), nrow * ncol, "Matrix::from_row_slice size");

        let mut mat = Matrix::new(nrow, ncol);

        for i in 0..nrow {
            for j in 0..ncol {
                mat[[i, j]] = data[i * ncol + j];
            }
        }

        mat
    }

    pub fn from_fn<F: FnMut(usize, usize) -> T>(nrow: usize, ncol: usize, mut f: F) -> Matrix<T> {
        let mut mat = Matrix::new(nrow, ncol);

        for j in 0..ncol {
            for i in 0..nrow {
                mat[[i, j]] = f(i, j);
            }
        }

        mat
    }

    pub fn identity(n: usize) -> Matrix<T> {
        let mut mat = Matrix::new(n, n);

        for i in 0..n {
            mat[[i, i]] = T::one();
        }

        mat
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrow, self.ncol)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get_col(&self, icol: usize) -> &[T] {
        &self.data[icol * self.nrow..(icol + 1) * self.nrow]
    }

    pub fn get_col_mut(&mut self, icol: usize) -> &mut [T] {
        &mut self.data[icol * self.nrow..(icol + 1) * self.nrow]
    }

    /// Columns `j0..j0+n` as one contiguous slice.
    pub fn cols(&self, j0: usize, n: usize) -> &[T] {
        &self.data[j0 * self.nrow..(j0 + n) * self.nrow]
    }

    pub fn adjoint(&self) -> Matrix<T> {
        let mut mat = Matrix::new(self.ncol, self.nrow);

        for j in 0..self.ncol {
            for i in 0..self.nrow {
                mat[[j, i]] = self[[i, j]].conjugate();
            }
        }

        mat
    }

    pub fn scale(&mut self, alpha: T) {
        for v in self.data.iter_mut() {
            *v *= alpha;
        }
    }

    /// self += alpha * other
    pub fn axpy(&mut self, alpha: T, other: &Matrix<T>) {
        assert_eq!(self.shape(), other.shape(), "Matrix::axpy shape");

        for (d, &s) in multizip((self.data.iter_mut(), other.data.iter())) {
            *d += alpha * s;
        }
    }

    /// Copy `src[si.., sj..]` of size `nr x nc` into `self[di.., dj..]`.
    pub fn copy_block(&mut self, di: usize, dj: usize, src: &Matrix<T>, si: usize, sj: usize, nr: usize, nc: usize) {
        assert!(di + nr <= self.nrow && dj + nc <= self.ncol, "Matrix::copy_block destination window");
        assert!(si + nr <= src.nrow && sj + nc <= src.ncol, "Matrix::copy_block source window");

        for j in 0..nc {
            let d = (dj + j) * self.nrow + di;
            let s = (sj + j) * src.nrow + si;

            self.data[d..d + nr].copy_from_slice(&src.data[s..s + nr]);
        }
    }

    pub fn sum(&self) -> T {
        self.data.iter().fold(T::zero(), |acc, &x| acc + x)
    }

    pub fn norm_max(&self) -> f64 {
        self.data.iter().fold(0.0, |acc: f64, x| acc.max(x.modulus_f64()))
    }

    /// max |self - other| over all elements.
    pub fn max_abs_diff(&self, other: &Matrix<T>) -> f64 {
        assert_eq!(self.shape(), other.shape(), "Matrix::max_abs_diff shape");

        multizip((self.data.iter(), other.data.iter()))
            .fold(0.0, |acc: f64, (&a, &b)| acc.max((a - b).modulus_f64()))
    }
}

impl<T: Scalar> Index<[usize; 2]> for Matrix<T> {
    type Output = T;

    fn index(&self, idx: [usize; 2]) -> &T {
        debug_assert!(idx[0] < self.nrow && idx[1] < self.ncol);

        &self.data[idx[1] * self.nrow + idx[0]]
    }
}

impl<T: Scalar> IndexMut<[usize; 2]> for Matrix<T> {
    fn index_mut(&mut self, idx: [usize; 2]) -> &mut T {
        debug_assert!(idx[0] < self.nrow && idx[1] < self.ncol);

        &mut self.data[idx[1] * self.nrow + idx[0]]
    }
}

impl<T: Scalar> Dot<Matrix<T>> for Matrix<T> {
    type Output = Matrix<T>;

    fn dot(&self, rhs: &Matrix<T>) -> Matrix<T> {
        assert_eq!(
            self.ncol, rhs.nrow,
            "Matrix::dot: {}x{} . {}x{}",
            self.nrow, self.ncol, rhs.nrow, rhs.ncol
        );

        let mut out = Matrix::new(self.nrow, rhs.ncol);

        for j in 0..rhs.ncol {
            for k in 0..self.ncol {
                let b = rhs[[k, j]];

                for (o, &a) in multizip((out.get_col_mut(j).iter_mut(), self.get_col(k).iter())) {
                    *o += a * b;
                }
            }
        }

        out
    }
}

impl<T: Scalar> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self.nrow {
            for j in 0..self.ncol {
                write!(f, " {:?}", self[[i, j]])?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::c64;

    #[test]
    fn test_dot_with_identity() {
        let a = Matrix::<c64>::from_fn(3, 2, |i, j| c64::new(i as f64, j as f64 + 1.0));

        let b = a.dot(&Matrix::identity(2));

        assert_eq!(a, b);
    }

    #[test]
    fn test_row_slice_layout() {
        let m = Matrix::<f64>::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(m.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(m[[1, 2]], 6.0);

        let t = m.adjoint();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t[[2, 1]], 6.0);
    }

    #[test]
    fn test_copy_block() {
        let src = Matrix::<f64>::from_fn(4, 4, |i, j| (10 * i + j) as f64);
        let mut dst = Matrix::<f64>::new(3, 3);

        dst.copy_block(1, 1, &src, 2, 1, 2, 2);

        assert_eq!(dst[[1, 1]], 21.0);
        assert_eq!(dst[[2, 2]], 32.0);
        assert_eq!(dst[[0, 0]], 0.0);
    }
}
