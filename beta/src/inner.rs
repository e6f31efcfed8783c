use crate::{BetaError, BetaProjectors, ChunkCoeffs};

use linalg::{Gemm, Op};
use log::{debug, warn};
use matrix::{check_hermitian, Matrix};
use memory::{MemoryError, MemoryPool, MemoryType, PoolBlock};
use std::sync::Arc;
use types::Scalar;

// Pins the closure signature so the returned `Gemm` borrows from its inputs
fn gemm_fn2<T, G: for<'a> Fn(&'a [T], &'a [T]) -> Gemm<'a, T, T>>(f: G) -> G {
    f
}

fn gemm_fn3<T, G: for<'a> Fn(&'a [T], &'a [T], usize) -> Gemm<'a, T, T>>(f: G) -> G {
    f
}

fn stage<T: Scalar>(pool: &Arc<MemoryPool>, src: &[T]) -> Result<PoolBlock<T>, MemoryError> {
    let mut blk = pool.acquire(src.len())?;

    blk.as_mut_slice().copy_from_slice(src);

    Ok(blk)
}

/// `beta^H X` over the local G+k rows only; `x` holds at least `nbnd`
/// columns of `num_gkvec_loc` rows.
pub fn inner_local<T: Scalar>(beta: &ChunkCoeffs<T>, x: &Matrix<T>, nbnd: usize) -> Result<Matrix<T>, BetaError> {
    let ngk = beta.num_gkvec_loc();
    let nb = beta.num_beta();

    assert_eq!(x.nrow(), ngk, "inner: {} rows, chunk {} has {} local G+k", x.nrow(), beta.index(), ngk);
    assert!(nbnd <= x.ncol(), "inner: {} bands requested from {} columns", nbnd, x.ncol());

    let mut out = Matrix::<T>::new(nb, nbnd);

    let gemm = gemm_fn2(|a: &[T], b: &[T]| Gemm {
        op_a: Op::C,
        m: nb,
        n: nbnd,
        k: ngk,
        alpha: T::one(),
        a,
        lda: ngk,
        b,
        ldb: ngk,
        beta: T::zero(),
    });

    match beta.mem() {
        MemoryType::Host => gemm(beta.at(MemoryType::Host), x.as_slice()).run_host(out.as_mut_slice(), nb),
        MemoryType::Device => {
            let xd = stage(beta.pool(), x.cols(0, nbnd))?;
            let mut od = beta.pool().acquire::<T>(nb * nbnd)?;

            gemm(beta.at(MemoryType::Device), xd.as_slice()).run_device(od.as_mut_slice(), nb);

            out.as_mut_slice().copy_from_slice(od.as_slice());
        }
    }

    Ok(out)
}

/// `beta^H X` summed over the G+k communicator.
pub fn inner<T: Scalar>(beta: &ChunkCoeffs<T>, x: &Matrix<T>, nbnd: usize) -> Result<Matrix<T>, BetaError> {
    let mut out = inner_local(beta, x, nbnd)?;

    dwmpi::allreduce_sum(beta.comm(), out.as_mut_slice());

    Ok(out)
}

/// `Y += alpha * beta * C[row0..row0 + num_beta, ..]` on the local G+k rows
/// of all columns of `y`.
pub fn add_beta_product<T: Scalar>(
    beta: &ChunkCoeffs<T>,
    alpha: T,
    c: &Matrix<T>,
    row0: usize,
    y: &mut Matrix<T>,
) -> Result<(), BetaError> {
    let ngk = beta.num_gkvec_loc();
    let nb = beta.num_beta();
    let nbnd = y.ncol();

    assert_eq!(y.nrow(), ngk, "beta product: {} rows, chunk {} has {} local G+k", y.nrow(), beta.index(), ngk);
    assert!(
        row0 + nb <= c.nrow() && nbnd <= c.ncol(),
        "beta product: rows {}..{} x {} columns outside {}x{} coefficients",
        row0,
        row0 + nb,
        nbnd,
        c.nrow(),
        c.ncol()
    );

    if nbnd == 0 {
        return Ok(());
    }

    let gemm = gemm_fn3(|a: &[T], b: &[T], ldb: usize| Gemm {
        op_a: Op::N,
        m: ngk,
        n: nbnd,
        k: nb,
        alpha,
        a,
        lda: ngk,
        b,
        ldb,
        beta: T::one(),
    });

    match beta.mem() {
        MemoryType::Host => {
            gemm(beta.at(MemoryType::Host), &c.as_slice()[row0..], c.nrow()).run_host(y.as_mut_slice(), ngk)
        }
        MemoryType::Device => {
            let packed = Matrix::from_fn(nb, nbnd, |i, j| c[[row0 + i, j]]);

            let cd = stage(beta.pool(), packed.as_slice())?;
            let mut yd = stage(beta.pool(), y.as_slice())?;

            gemm(beta.at(MemoryType::Device), cd.as_slice(), nb).run_device(yd.as_mut_slice(), ngk);

            y.as_mut_slice().copy_from_slice(yd.as_slice());
        }
    }

    Ok(())
}

// a^H b for two chunks of the same generator
fn chunk_pair<T: Scalar>(a: &ChunkCoeffs<T>, b: &ChunkCoeffs<T>) -> Result<Matrix<T>, BetaError> {
    let ngk = a.num_gkvec_loc();
    let (na, nb) = (a.num_beta(), b.num_beta());

    let mut out = Matrix::<T>::new(na, nb);

    let gemm = gemm_fn2(|x: &[T], y: &[T]| Gemm {
        op_a: Op::C,
        m: na,
        n: nb,
        k: ngk,
        alpha: T::one(),
        a: x,
        lda: ngk,
        b: y,
        ldb: ngk,
        beta: T::zero(),
    });

    match a.mem() {
        MemoryType::Host => gemm(a.at(MemoryType::Host), b.at(MemoryType::Host)).run_host(out.as_mut_slice(), na),
        MemoryType::Device => {
            let mut od = a.pool().acquire::<T>(na * nb)?;

            gemm(a.at(MemoryType::Device), b.at(MemoryType::Device)).run_device(od.as_mut_slice(), na);

            out.as_mut_slice().copy_from_slice(od.as_slice());
        }
    }

    Ok(out)
}

/// `B = beta^H beta` over the full projector set, summed over the G+k
/// communicator.
pub fn inner_beta<T: Scalar>(bp: &BetaProjectors) -> Result<Matrix<T>, BetaError> {
    let n = bp.num_total_beta();

    let mut bmat = Matrix::<T>::new(n, n);

    let mut buf_i = bp.prepare::<T>()?;
    let mut buf_j = bp.prepare::<T>()?;

    for ichunk in 0..bp.num_chunks() {
        let ci = bp.generate(&mut buf_i, ichunk);

        for jchunk in 0..=ichunk {
            let blk = if jchunk == ichunk {
                chunk_pair(&ci, &ci)?
            } else {
                let cj = bp.generate(&mut buf_j, jchunk);
                chunk_pair(&ci, &cj)?
            };

            let (oi, oj) = (ci.offset(), bp.chunk(jchunk).offset());

            bmat.copy_block(oi, oj, &blk, 0, 0, blk.nrow(), blk.ncol());

            if jchunk != ichunk {
                let adj = blk.adjoint();
                bmat.copy_block(oj, oi, &adj, 0, 0, adj.nrow(), adj.ncol());
            }
        }
    }

    dwmpi::allreduce_sum(bp.comm(), bmat.as_mut_slice());

    if !check_hermitian("beta^H beta", &bmat, 1e-12 * (1.0 + bmat.norm_max())) {
        warn!("inner_beta: {}x{} projector overlap is not hermitian", n, n);
    }

    debug!("inner_beta: {}x{} from {} chunks", n, n, bp.num_chunks());

    Ok(bmat)
}
