use crate::{OverlapError, QOperator};

use beta::{add_beta_product, inner_beta, inner_local, BetaProjectors};
use linalg::{lu_factor, LinalgError, LuFactor};
use log::debug;
use matrix::Matrix;
use memory::MemoryType;
use types::Scalar;
use wavefunctions::WaveFunctions;

/// Operator acting on blocks of plane-wave coefficients: `num_gkvec_loc`
/// local rows, one column per band.
pub trait ApplyOperator<T: Scalar> {
    fn apply_to(&self, y: &mut Matrix<T>, x: &Matrix<T>) -> Result<(), OverlapError>;

    fn apply(&self, x: &Matrix<T>) -> Result<Matrix<T>, OverlapError> {
        let mut y = Matrix::new(x.nrow(), x.ncol());

        self.apply_to(&mut y, x)?;

        Ok(y)
    }

    /// Bands `i0..i0 + n` of spin component `isc` of `wf_in` into the same
    /// bands of `wf_out`. The input is read from, and the result written to,
    /// the `mem` copy, which the caller keeps current. Only plane-wave
    /// coefficients are supported.
    fn apply_wf(
        &self,
        wf_out: &mut WaveFunctions<T>,
        wf_in: &WaveFunctions<T>,
        mem: MemoryType,
        isc: usize,
        i0: usize,
        n: usize,
    ) -> Result<(), OverlapError> {
        assert!(
            !wf_in.has_mt() && !wf_out.has_mt(),
            "apply_wf: wave functions with muffin-tin coefficients"
        );
        assert!(
            i0 + n <= wf_in.num_wf() && i0 + n <= wf_out.num_wf(),
            "apply_wf: bands {}..{} outside {} / {}",
            i0,
            i0 + n,
            wf_in.num_wf(),
            wf_out.num_wf()
        );

        let ngk = wf_in.num_pw_loc();

        let x = Matrix::from_column_slice(ngk, n, &wf_in.pw_coeffs(isc).at(mem)[i0 * ngk..(i0 + n) * ngk]);

        let mut y = Matrix::new(ngk, n);

        self.apply_to(&mut y, &x)?;

        wf_out.pw_coeffs_mut(isc).at_mut(mem)[i0 * ngk..(i0 + n) * ngk].copy_from_slice(y.as_slice());

        Ok(())
    }
}

// y = x + beta * sign * Q * [solve](beta^H x)
fn apply_low_rank<T: Scalar>(
    bp: &BetaProjectors,
    q: &QOperator<T>,
    ispn: usize,
    lu: Option<&LuFactor<T>>,
    sign: f64,
    y: &mut Matrix<T>,
    x: &Matrix<T>,
) -> Result<(), OverlapError> {
    let ngk = bp.gvec_partition().count();
    let nbnd = x.ncol();

    assert!(
        x.nrow() == ngk && y.shape() == x.shape(),
        "overlap: input {}x{}, output {}x{}, {} local G+k",
        x.nrow(),
        x.ncol(),
        y.nrow(),
        y.ncol(),
        ngk
    );

    let mut bx = Matrix::<T>::new(bp.num_total_beta(), nbnd);

    let mut buf = bp.prepare::<T>()?;

    for ichunk in 0..bp.num_chunks() {
        let beta = bp.generate(&mut buf, ichunk);

        let part = inner_local(&beta, x, nbnd)?;

        bx.copy_block(beta.offset(), 0, &part, 0, 0, part.nrow(), nbnd);
    }

    dwmpi::allreduce_sum(bp.comm(), bx.as_mut_slice());

    if let Some(lu) = lu {
        lu.solve_in_place(&mut bx);
    }

    let corr = q.rmatmul(&bx, ispn, T::from_re(sign));

    y.as_mut_slice().copy_from_slice(x.as_slice());

    for ichunk in 0..bp.num_chunks() {
        let beta = bp.generate(&mut buf, ichunk);

        add_beta_product(&beta, T::one(), &corr, beta.offset(), y)?;
    }

    Ok(())
}

fn check_size<T: Scalar>(bp: &BetaProjectors, q: &QOperator<T>, ik: usize, ispn: usize) -> Result<(), OverlapError> {
    if q.size() != bp.num_total_beta() {
        return Err(OverlapError::SizeMismatch {
            ik,
            ispn,
            q: q.size(),
            beta: bp.num_total_beta(),
        });
    }

    Ok(())
}

/// `S = I + beta Q beta^H`
pub struct OverlapOperator<'a, T: Scalar> {
    bp: &'a BetaProjectors,
    q: &'a QOperator<T>,
    ik: usize,
    ispn: usize,
}

impl<'a, T: Scalar> OverlapOperator<'a, T> {
    pub fn new(bp: &'a BetaProjectors, q: &'a QOperator<T>, ik: usize, ispn: usize) -> Result<Self, OverlapError> {
        check_size(bp, q, ik, ispn)?;

        Ok(OverlapOperator { bp, q, ik, ispn })
    }

    pub fn ik(&self) -> usize {
        self.ik
    }

    pub fn ispn(&self) -> usize {
        self.ispn
    }
}

impl<'a, T: Scalar> ApplyOperator<T> for OverlapOperator<'a, T> {
    fn apply_to(&self, y: &mut Matrix<T>, x: &Matrix<T>) -> Result<(), OverlapError> {
        apply_low_rank(self.bp, self.q, self.ispn, None, 1.0, y, x)
    }
}

/// `S^-1 = I - beta Q (I + B Q)^-1 beta^H` with `B = beta^H beta`. The
/// factorisation is done once, in `new`.
pub struct InverseOverlapOperator<'a, T: Scalar> {
    bp: &'a BetaProjectors,
    q: &'a QOperator<T>,
    ik: usize,
    ispn: usize,
    lu: LuFactor<T>,
}

impl<'a, T: Scalar> InverseOverlapOperator<'a, T> {
    pub fn new(bp: &'a BetaProjectors, q: &'a QOperator<T>, ik: usize, ispn: usize) -> Result<Self, OverlapError> {
        check_size(bp, q, ik, ispn)?;

        let bmat = inner_beta::<T>(bp)?;

        let mut ibq = q.lmatmul(&bmat, ispn);

        for i in 0..ibq.nrow() {
            ibq[[i, i]] += T::one();
        }

        let lu = lu_factor(&ibq).map_err(|e| match e {
            LinalgError::Singular {
                n,
                min_pivot,
                max_pivot,
            } => OverlapError::Singular {
                ik,
                ispn,
                n,
                min_pivot,
                max_pivot,
            },
            e => OverlapError::Linalg(e),
        })?;

        debug!("inverse overlap k-point {} spin {}: {}x{} factorised", ik, ispn, lu.size(), lu.size());

        Ok(InverseOverlapOperator { bp, q, ik, ispn, lu })
    }

    pub fn ik(&self) -> usize {
        self.ik
    }

    pub fn ispn(&self) -> usize {
        self.ispn
    }
}

impl<'a, T: Scalar> ApplyOperator<T> for InverseOverlapOperator<'a, T> {
    fn apply_to(&self, y: &mut Matrix<T>, x: &Matrix<T>) -> Result<(), OverlapError> {
        apply_low_rank(self.bp, self.q, self.ispn, Some(&self.lu), -1.0, y, x)
    }
}
