use crate::LinalgType;

use matrix::Matrix;
use rayon::prelude::*;
use std::ops::Mul;
use types::Scalar;

/// Operation applied to the left operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    N,
    T,
    C,
}

/// Column-major operands of `C = alpha * op(A) * B + beta * C`.
///
/// `a`, `b` and `c` start at the first element of the respective window;
/// `op(A)` is `m x k`, `B` is `k x n`, `C` is `m x n`.
pub struct Gemm<'a, T, F> {
    pub op_a: Op,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub alpha: T,
    pub a: &'a [T],
    pub lda: usize,
    pub b: &'a [F],
    pub ldb: usize,
    pub beta: T,
}

impl<'a, T, F> Gemm<'a, T, F>
where
    T: Scalar + Mul<F, Output = T>,
    F: Scalar,
{
    fn check(&self, c: &[T], ldc: usize) {
        let (arow, acol) = match self.op_a {
            Op::N => (self.m, self.k),
            _ => (self.k, self.m),
        };

        assert!(arow <= self.lda || acol == 0, "gemm: lda {} < {}", self.lda, arow);
        assert!(self.k <= self.ldb || self.n == 0, "gemm: ldb {} < {}", self.ldb, self.k);
        assert!(self.m <= ldc || self.n == 0, "gemm: ldc {} < {}", ldc, self.m);

        assert!(span(arow, acol, self.lda) <= self.a.len(), "gemm: A window exceeds its buffer");
        assert!(span(self.k, self.n, self.ldb) <= self.b.len(), "gemm: B window exceeds its buffer");
        assert!(span(self.m, self.n, ldc) <= c.len(), "gemm: C window exceeds its buffer");
    }

    // every backend goes through this so the summation order is fixed
    fn column(&self, j: usize, cj: &mut [T]) {
        let cj = &mut cj[..self.m];

        if self.beta == T::zero() {
            cj.iter_mut().for_each(|x| *x = T::zero());
        } else if self.beta != T::one() {
            cj.iter_mut().for_each(|x| *x *= self.beta);
        }

        if self.k == 0 || self.alpha == T::zero() {
            return;
        }

        let bj = &self.b[j * self.ldb..j * self.ldb + self.k];

        match self.op_a {
            Op::N => {
                for (l, &blj) in bj.iter().enumerate() {
                    let s = self.alpha * blj;

                    let al = &self.a[l * self.lda..l * self.lda + self.m];

                    for (x, &a) in cj.iter_mut().zip(al.iter()) {
                        *x += a * s;
                    }
                }
            }
            Op::T | Op::C => {
                let conj = self.op_a == Op::C;

                for (i, x) in cj.iter_mut().enumerate() {
                    let ai = &self.a[i * self.lda..i * self.lda + self.k];

                    let mut dot = T::zero();

                    for (&a, &blj) in ai.iter().zip(bj.iter()) {
                        let a = if conj { a.conjugate() } else { a };
                        dot += a * blj;
                    }

                    *x += self.alpha * dot;
                }
            }
        }
    }

    /// Host kernel; output columns are computed in parallel.
    pub fn run_host(&self, c: &mut [T], ldc: usize) {
        self.check(c, ldc);

        if self.m == 0 || self.n == 0 {
            return;
        }

        c.par_chunks_mut(ldc)
            .take(self.n)
            .enumerate()
            .for_each(|(j, cj)| self.column(j, cj));
    }

    /// Device kernel. The operands must be device-resident buffers.
    pub fn run_device(&self, c: &mut [T], ldc: usize) {
        self.check(c, ldc);

        if self.m == 0 || self.n == 0 {
            return;
        }

        for (j, cj) in c.chunks_mut(ldc).take(self.n).enumerate() {
            self.column(j, cj);
        }
    }

    pub fn run(&self, la: LinalgType, c: &mut [T], ldc: usize) {
        if la.is_device() {
            self.run_device(c, ldc)
        } else {
            self.run_host(c, ldc)
        }
    }
}

fn span(nrow: usize, ncol: usize, ld: usize) -> usize {
    if nrow == 0 || ncol == 0 {
        0
    } else {
        (ncol - 1) * ld + nrow
    }
}

/// op(A) * B for local matrices on the host.
pub fn matmul<T: Scalar>(op_a: Op, a: &Matrix<T>, b: &Matrix<T>) -> Matrix<T> {
    let (m, k) = match op_a {
        Op::N => (a.nrow(), a.ncol()),
        _ => (a.ncol(), a.nrow()),
    };

    assert_eq!(
        k,
        b.nrow(),
        "matmul: op(A) is {}x{}, B is {}x{}",
        m,
        k,
        b.nrow(),
        b.ncol()
    );

    let mut c = Matrix::new(m, b.ncol());

    let ldc = m.max(1);

    Gemm {
        op_a,
        m,
        n: b.ncol(),
        k,
        alpha: T::one(),
        a: a.as_slice(),
        lda: a.nrow().max(1),
        b: b.as_slice(),
        ldb: b.nrow().max(1),
        beta: T::zero(),
    }
    .run_host(c.as_mut_slice(), ldc);

    c
}
