use context::SimulationContext;
use dmatrix::DMatrix;
use linalg::{Gemm, LinalgType, Op};
use log::debug;
use memory::{MemoryType, PoolBlock};
use std::ops::Mul;
use types::Scalar;
use wavefunctions::{SpinRange, WaveFunctions};

/// `wf_out[:, j0..j0+n] = wf_in[:, i0..i0+m] * M[0..m, 0..n]` for the spin
/// components selected by `ispn`.
pub fn transform<T, F>(
    ctx: &SimulationContext,
    ispn: usize,
    wf_in: &WaveFunctions<T>,
    i0: usize,
    m: usize,
    mtrx: &DMatrix<F>,
    wf_out: &mut WaveFunctions<T>,
    j0: usize,
    n: usize,
) where
    T: Scalar + Mul<F, Output = T>,
    F: Scalar,
{
    transform_ab(ctx, ispn, T::one(), wf_in, i0, m, mtrx, 0, 0, T::zero(), wf_out, j0, n)
}

/// `wf_out[:, j0..j0+n] = alpha * wf_in[:, i0..i0+m] * M[irow0.., jcol0..] + beta * wf_out[:, j0..j0+n]`
///
/// Collective over the ranks of the matrix grid. With the `GpuBlas`
/// backend the wave functions must already be resident on the device; the
/// matrix is staged by this function.
#[allow(clippy::too_many_arguments)]
pub fn transform_ab<T, F>(
    ctx: &SimulationContext,
    ispn: usize,
    alpha: T,
    wf_in: &WaveFunctions<T>,
    i0: usize,
    m: usize,
    mtrx: &DMatrix<F>,
    irow0: usize,
    jcol0: usize,
    beta: T,
    wf_out: &mut WaveFunctions<T>,
    j0: usize,
    n: usize,
) where
    T: Scalar + Mul<F, Output = T>,
    F: Scalar,
{
    let spins = SpinRange::new(ispn);

    check_arguments(spins, wf_in, i0, m, mtrx, irow0, jcol0, wf_out, j0, n);

    if m == 0 || n == 0 {
        return;
    }

    let la = ctx.blas_linalg_t();

    let mem = if la.is_device() { MemoryType::Device } else { MemoryType::Host };

    let job = Job {
        la,
        mem,
        spins,
        alpha,
        beta,
        i0,
        m,
    };

    let grid = mtrx.grid();

    if grid.size() == 1 {
        let ld = mtrx.num_rows_local();
        let sub = &mtrx.local().at(MemoryType::Host)[jcol0 * ld + irow0..];

        match mem {
            MemoryType::Host => job.multiply(wf_in, sub, ld, wf_out, j0, n),
            MemoryType::Device => {
                let staged = stage(ctx, sub, ld, m, n);
                job.multiply(wf_in, staged.as_slice(), m, wf_out, j0, n)
            }
        }

        return;
    }

    let spl_row = mtrx.spl_row();
    let spl_col = mtrx.spl_col();

    let nprow = grid.num_ranks_row();
    let npcol = grid.num_ranks_col();

    // rows of the window owned by each process row, in local order
    let mut rows_of: Vec<Vec<usize>> = vec![Vec::new(); nprow];
    for i in irow0..irow0 + m {
        rows_of[spl_row.owner(i)].push(i);
    }

    let panel_width = mtrx.bs_col() * npcol;

    let num_panels = (n + panel_width - 1) / panel_width;

    debug!(
        "transform: {}x{} window of {}x{} matrix in {} panel(s) on {}x{} grid, {}",
        m,
        n,
        mtrx.num_rows(),
        mtrx.num_cols(),
        num_panels,
        nprow,
        npcol,
        la
    );

    let mut panel = vec![F::zero(); m * panel_width.min(n)];

    for ipanel in 0..num_panels {
        let c0 = jcol0 + ipanel * panel_width;
        let nc = panel_width.min(jcol0 + n - c0);

        let mut cols_of: Vec<Vec<usize>> = vec![Vec::new(); npcol];
        for j in c0..c0 + nc {
            cols_of[spl_col.owner(j)].push(j);
        }

        // pack the owned part of the panel, column by column
        let nrl = mtrx.num_rows_local();
        let local = mtrx.local().at(MemoryType::Host);

        let mut packed = Vec::with_capacity(rows_of[grid.rank_row()].len() * cols_of[grid.rank_col()].len());

        for &j in cols_of[grid.rank_col()].iter() {
            let jl = spl_col.local_index(j);

            for &i in rows_of[grid.rank_row()].iter() {
                packed.push(local[jl * nrl + spl_row.local_index(i)]);
            }
        }

        let pieces = dwmpi::allgatherv(grid.comm(), &packed);

        for (rank, piece) in pieces.iter().enumerate() {
            let (prow, pcol) = grid.coords(rank);

            let mut src = piece.iter();

            for &j in cols_of[pcol].iter() {
                for &i in rows_of[prow].iter() {
                    panel[(j - c0) * m + (i - irow0)] = match src.next() {
                        Some(&v) => v,
                        None => panic!("transform: panel piece of rank {} is short", rank),
                    };
                }
            }
        }

        let jout = j0 + (c0 - jcol0);

        match mem {
            MemoryType::Host => job.multiply(wf_in, &panel[..m * nc], m, wf_out, jout, nc),
            MemoryType::Device => {
                let staged = stage(ctx, &panel, m, m, nc);
                job.multiply(wf_in, staged.as_slice(), m, wf_out, jout, nc)
            }
        }
    }
}

struct Job<T> {
    la: LinalgType,
    mem: MemoryType,
    spins: SpinRange,
    alpha: T,
    beta: T,
    i0: usize,
    m: usize,
}

impl<T: Scalar> Job<T> {
    /// out[:, j0..j0+n] = alpha * in[:, i0..i0+m] * sub + beta * out[:, j0..j0+n]
    /// on the plane-wave and muffin-tin blocks.
    fn multiply<F>(&self, wf_in: &WaveFunctions<T>, sub: &[F], ldsub: usize, wf_out: &mut WaveFunctions<T>, j0: usize, n: usize)
    where
        T: Mul<F, Output = T>,
        F: Scalar,
    {
        for ispn in self.spins.iter() {
            let nrow = wf_in.num_pw_loc();

            let a = &wf_in.pw_coeffs(ispn).at(self.mem)[self.i0 * nrow..];
            let c = &mut wf_out.pw_coeffs_mut(ispn).at_mut(self.mem)[j0 * nrow..];

            self.gemm(nrow, n, a, sub, ldsub, c);

            if wf_in.has_mt() {
                let nrow = wf_in.num_mt_loc();

                let a = &wf_in.mt_coeffs(ispn).at(self.mem)[self.i0 * nrow..];
                let c = &mut wf_out.mt_coeffs_mut(ispn).at_mut(self.mem)[j0 * nrow..];

                self.gemm(nrow, n, a, sub, ldsub, c);
            }
        }
    }

    fn gemm<F>(&self, nrow: usize, n: usize, a: &[T], b: &[F], ldb: usize, c: &mut [T])
    where
        T: Mul<F, Output = T>,
        F: Scalar,
    {
        if nrow == 0 {
            return;
        }

        Gemm {
            op_a: Op::N,
            m: nrow,
            n,
            k: self.m,
            alpha: self.alpha,
            a,
            lda: nrow,
            b,
            ldb,
            beta: self.beta,
        }
        .run(self.la, c, nrow);
    }
}

/// Copies an `m x n` window with leading dimension `ld` into a contiguous
/// device block.
fn stage<F: Scalar>(ctx: &SimulationContext, sub: &[F], ld: usize, m: usize, n: usize) -> PoolBlock<F> {
    let mut block = match ctx.mem_pool(MemoryType::Device).acquire::<F>(m * n) {
        Ok(b) => b,
        Err(e) => panic!(
            "transform: cannot stage the {}x{} matrix window ({} bytes) on the device: {}",
            m,
            n,
            m * n * std::mem::size_of::<F>(),
            e
        ),
    };

    for j in 0..n {
        block.as_mut_slice()[j * m..(j + 1) * m].copy_from_slice(&sub[j * ld..j * ld + m]);
    }

    block
}

#[allow(clippy::too_many_arguments)]
fn check_arguments<T: Scalar, F: Scalar>(
    spins: SpinRange,
    wf_in: &WaveFunctions<T>,
    i0: usize,
    m: usize,
    mtrx: &DMatrix<F>,
    irow0: usize,
    jcol0: usize,
    wf_out: &WaveFunctions<T>,
    j0: usize,
    n: usize,
) {
    assert!(
        i0 + m <= wf_in.num_wf(),
        "transform: input bands {}..{} outside {} wave functions",
        i0,
        i0 + m,
        wf_in.num_wf()
    );
    assert!(
        j0 + n <= wf_out.num_wf(),
        "transform: output bands {}..{} outside {} wave functions",
        j0,
        j0 + n,
        wf_out.num_wf()
    );
    assert!(
        irow0 + m <= mtrx.num_rows() && jcol0 + n <= mtrx.num_cols(),
        "transform: {}x{} window at ({}, {}) outside {}x{} matrix",
        m,
        n,
        irow0,
        jcol0,
        mtrx.num_rows(),
        mtrx.num_cols()
    );
    assert!(
        spins.last() < wf_in.num_sc() && spins.last() < wf_out.num_sc(),
        "transform: spin range {:?} with {} and {} components",
        spins,
        wf_in.num_sc(),
        wf_out.num_sc()
    );
    assert_eq!(
        wf_in.num_pw_loc(),
        wf_out.num_pw_loc(),
        "transform: local G-vector counts of input and output differ"
    );
    assert_eq!(
        wf_in.has_mt(),
        wf_out.has_mt(),
        "transform: muffin-tin part present in only one of input and output"
    );
    assert_eq!(
        wf_in.num_mt_loc(),
        wf_out.num_mt_loc(),
        "transform: local muffin-tin counts of input and output differ"
    );
}
